/// OpenAI chat completions backend
use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use serde_json::{json, Value};

use super::{GenerationParams, TextGenerator};

const BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn request_body(&self, prompt: &str, params: GenerationParams) -> Value {
        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": params.temperature,
            "max_tokens": params.max_output_tokens,
        })
    }

    fn extract_text(body: &Value) -> Option<String> {
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
    }
}

impl TextGenerator for OpenAiBackend {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        params: GenerationParams,
    ) -> BoxFuture<'a, Result<String>> {
        async move {
            let resp = self
                .client
                .post(format!("{BASE_URL}/chat/completions"))
                .bearer_auth(&self.api_key)
                .json(&self.request_body(prompt, params))
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                anyhow::bail!("OpenAI API error {status}: {text}");
            }

            let body: Value = resp.json().await?;
            Self::extract_text(&body)
                .ok_or_else(|| anyhow::anyhow!("OpenAI response has no message content"))
        }
        .boxed()
    }
}
