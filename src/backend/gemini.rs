/// Google Gemini API backend (native generateContent, not OpenAI-compat)
use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use serde_json::{json, Value};

use super::{GenerationParams, TextGenerator};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn api_url(&self) -> String {
        format!("{BASE_URL}/{}:generateContent", self.model)
    }

    fn request_body(prompt: &str, params: GenerationParams) -> Value {
        json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_output_tokens,
            }
        })
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(body: &Value) -> Option<String> {
        let parts = body["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect();
        Some(text)
    }
}

impl TextGenerator for GeminiBackend {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        params: GenerationParams,
    ) -> BoxFuture<'a, Result<String>> {
        async move {
            let resp = self
                .client
                .post(self.api_url())
                .header("x-goog-api-key", &self.api_key)
                .json(&Self::request_body(prompt, params))
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                anyhow::bail!("Gemini API error {status}: {text}");
            }

            let body: Value = resp.json().await?;
            Self::extract_text(&body)
                .ok_or_else(|| anyhow::anyhow!("Gemini response has no candidate text"))
        }
        .boxed()
    }
}
