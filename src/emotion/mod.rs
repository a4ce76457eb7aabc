/// Emotion detection and physical reactions.
///
/// Text from a conversational turn is classified by a remote model, gated by
/// confidence and a cooldown window, mapped to a recording and played on the
/// lamp.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod classifier;
pub mod mapping;
pub mod service;

pub use classifier::EmotionClassifier;
pub use mapping::EmotionRecordingMap;
pub use service::{EmotionService, ReactionOutcome, SuppressReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Excited,
    Sad,
    Curious,
    Thoughtful,
    Angry,
    Surprised,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Happy,
        Emotion::Excited,
        Emotion::Sad,
        Emotion::Curious,
        Emotion::Thoughtful,
        Emotion::Angry,
        Emotion::Surprised,
        Emotion::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Excited => "excited",
            Emotion::Sad => "sad",
            Emotion::Curious => "curious",
            Emotion::Thoughtful => "thoughtful",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
            Emotion::Neutral => "neutral",
        }
    }

    /// Map a model label (canonical name or common synonym) to an emotion.
    /// Unknown labels fall back to `Neutral`.
    pub fn normalize(label: &str) -> Emotion {
        match label.trim().to_lowercase().as_str() {
            "happy" => Emotion::Happy,
            "excited" | "joy" => Emotion::Excited,
            "sad" | "disappointed" | "upset" => Emotion::Sad,
            "curious" | "interested" | "wondering" => Emotion::Curious,
            "thoughtful" | "thinking" | "contemplating" => Emotion::Thoughtful,
            "angry" | "frustrated" | "annoyed" => Emotion::Angry,
            "surprised" | "shocked" => Emotion::Surprised,
            _ => Emotion::Neutral,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse of a canonical name (config keys). Synonyms are not accepted.
impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown emotion: {s}"))
    }
}

/// Output of one classification call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub emotion: Emotion,
    /// Clamped to [0, 1]; 0.0 when the model gave nothing usable.
    pub confidence: f32,
    pub reasoning: String,
    /// Label exactly as the model returned it, before normalization.
    pub raw_label: String,
    pub raw_response: String,
}
