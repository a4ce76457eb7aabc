use std::collections::BTreeMap;

use crate::animation::RecordingStore;

use super::Emotion;

/// Emotion → ordered recording candidates; the first one on disk wins.
#[derive(Debug, Clone)]
pub struct EmotionRecordingMap {
    candidates: BTreeMap<Emotion, Vec<String>>,
}

impl Default for EmotionRecordingMap {
    fn default() -> Self {
        let table: [(Emotion, &[&str]); 8] = [
            (Emotion::Happy, &["happy_wiggle", "excited"]),
            (Emotion::Excited, &["excited", "luxo_excited", "happy_wiggle"]),
            (Emotion::Sad, &["sad", "luxo_sad", "head_down"]),
            (Emotion::Curious, &["curious", "luxo_curious"]),
            (Emotion::Thoughtful, &["thinking", "thoughtful"]),
            (Emotion::Angry, &["luxo_sad", "head_down", "sad"]),
            (Emotion::Surprised, &["luxo_excited", "excited"]),
            (Emotion::Neutral, &["idle"]),
        ];
        let candidates = table
            .into_iter()
            .map(|(e, names)| (e, names.iter().map(|n| n.to_string()).collect()))
            .collect();
        Self { candidates }
    }
}

impl EmotionRecordingMap {
    /// Default table with per-emotion lists replaced from config.
    /// Keys that are not canonical emotion names are logged and ignored.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Self {
        let mut map = Self::default();
        for (key, names) in overrides {
            match key.parse::<Emotion>() {
                Ok(emotion) => {
                    map.candidates.insert(emotion, names.clone());
                }
                Err(e) => tracing::warn!("ignoring recording override: {e}"),
            }
        }
        map
    }

    pub fn candidates(&self, emotion: Emotion) -> &[String] {
        self.candidates
            .get(&emotion)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First candidate the store confirms.
    ///
    /// When nothing is confirmed, including when the store lookup itself
    /// fails, the first candidate is returned anyway. The recording check
    /// before dispatch rejects it cleanly if it really is missing.
    pub fn map(&self, emotion: Emotion, store: &dyn RecordingStore) -> Option<String> {
        let candidates = self.candidates(emotion);
        let first = candidates.first()?;

        for name in candidates {
            match store.resolve(name) {
                Ok(Some(_)) => return Some(name.clone()),
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(recording = %name, "recording lookup failed: {e}");
                    break;
                }
            }
        }
        Some(first.clone())
    }
}
