/// Emotion classifier: one remote completion per utterance.
///
/// The model is asked for a bare JSON object but routinely wraps it in a
/// fenced block or surrounds it with prose, so extraction tries, in order:
/// a fenced block, the first balanced top-level object, the whole response.
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::backend::{api_key_from_env, create_generator, GenerationParams, TextGenerator};
use crate::config::EmotionConfig;
use crate::error::EmotionError;

use super::{ClassificationResult, Emotion};

/// Low temperature: the same sentence should get the same label.
pub const CLASSIFY_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.3,
    max_output_tokens: 150,
};

pub struct EmotionClassifier {
    generator: Box<dyn TextGenerator>,
}

impl EmotionClassifier {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Build the provider backend named in config. Fails if the API key is
    /// missing or the provider is unknown.
    pub fn from_config(config: &EmotionConfig) -> Result<Self, EmotionError> {
        let api_key = api_key_from_env(config)?;
        let generator = create_generator(config, api_key)?;
        Ok(Self::new(generator))
    }

    /// Classify `text`. `Ok(None)` for blank input (no remote call made).
    pub async fn try_classify(
        &self,
        text: &str,
    ) -> Result<Option<ClassificationResult>, EmotionError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let prompt = build_prompt(text);
        let response = self.generator.generate(&prompt, CLASSIFY_PARAMS).await?;
        let result = parse_classification(response.trim())?;

        tracing::info!(
            input = %snippet(text, 100),
            emotion = %result.emotion,
            raw = %result.raw_label,
            confidence = format_args!("{:.2}", result.confidence),
            reasoning = %snippet(&result.reasoning, 100),
            "emotion detected"
        );
        Ok(Some(result))
    }

    /// Like [`try_classify`](Self::try_classify) but failures are logged and
    /// reported as "no signal".
    pub async fn classify(&self, text: &str) -> Option<ClassificationResult> {
        match self.try_classify(text).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(input = %snippet(text, 100), "emotion analysis failed: {e}");
                None
            }
        }
    }
}

pub fn build_prompt(text: &str) -> String {
    format!(
        "Analyze the following text for emotion. Respond with ONLY a JSON object in this exact format:\n\
         {{\n\
         \x20   \"emotion\": \"happy|excited|sad|curious|thoughtful|angry|surprised|neutral\",\n\
         \x20   \"confidence\": 0.0-1.0,\n\
         \x20   \"reasoning\": \"brief explanation\"\n\
         }}\n\n\
         Text to analyze: \"{text}\"\n\n\
         JSON response:"
    )
}

/// Turn raw model output into a classification.
pub fn parse_classification(response: &str) -> Result<ClassificationResult, EmotionError> {
    let obj = extract_json_object(response)
        .ok_or_else(|| EmotionError::Parse(snippet(response, 100)))?;

    let raw_label = obj
        .get("emotion")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(ClassificationResult {
        emotion: Emotion::normalize(&raw_label),
        confidence: coerce_confidence(obj.get("confidence")),
        reasoning,
        raw_label,
        raw_response: response.to_string(),
    })
}

pub fn extract_json_object(response: &str) -> Option<Map<String, Value>> {
    fenced_block(response)
        .and_then(parse_object)
        .or_else(|| balanced_objects(response).find_map(parse_object))
        .or_else(|| parse_object(response))
}

fn fenced_block(text: &str) -> Option<&str> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fence pattern is valid")
    });
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Balanced `{...}` spans in order of appearance. Braces inside JSON strings
/// are ignored. A `{` that never closes is skipped and the scan resumes at the
/// next `{` after it.
fn balanced_objects(text: &str) -> impl Iterator<Item = &str> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || loop {
        let start = pos + text[pos..].find('{')?;
        match balanced_end(&text[start..]) {
            Some(len) => {
                pos = start + len;
                return Some(&text[start..pos]);
            }
            None => pos = start + 1,
        }
    })
}

/// Byte length of the object opening at the start of `text`, if it closes.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn coerce_confidence(value: Option<&Value>) -> f32 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0) as f32,
        _ => 0.0,
    }
}

/// First `max_chars` characters, safe on multi-byte text.
pub(crate) fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
