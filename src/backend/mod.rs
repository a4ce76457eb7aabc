pub mod gemini;
pub mod openai;

use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmotionConfig;
use crate::error::EmotionError;

/// A single tool definition exposed to the conversational agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Sampling parameters for a single completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// One-shot text completion against a remote model.
///
/// Object-safe (boxed future) so the classifier can hold any provider, or a
/// test double, behind `Box<dyn TextGenerator>`.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str, params: GenerationParams)
        -> BoxFuture<'a, Result<String>>;
}

/// Read the provider API key from the environment.
pub fn api_key_from_env(config: &EmotionConfig) -> Result<String, EmotionError> {
    let var = config.api_key_var();
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(EmotionError::MissingCredential(var.to_string())),
    }
}

/// Factory: create the right backend from config.
pub fn create_generator(
    config: &EmotionConfig,
    api_key: String,
) -> Result<Box<dyn TextGenerator>, EmotionError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| EmotionError::Config(format!("http client: {e}")))?;
    let model = config.effective_model().to_string();

    match config.provider.as_str() {
        "gemini" => Ok(Box::new(gemini::GeminiBackend::new(client, api_key, model))),
        "openai" => Ok(Box::new(openai::OpenAiBackend::new(client, api_key, model))),
        other => Err(EmotionError::Config(format!("unsupported provider: {other}"))),
    }
}
