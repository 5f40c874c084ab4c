//! Chat completion client.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use skubot_core::{Error, Result};

use crate::prompts::PromptMessage;

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Anything that can turn a prompt stack into answer text. The runtime is
/// written against this trait so tests can substitute a canned renderer.
#[async_trait]
pub trait AnswerRenderer: Send + Sync {
    async fn render(&self, messages: Vec<PromptMessage>) -> Result<String>;
}

pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f64,
}

impl OpenAiChatClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        }
    }
}

#[async_trait]
impl AnswerRenderer for OpenAiChatClient {
    async fn render(&self, messages: Vec<PromptMessage>) -> Result<String> {
        tracing::debug!(model = %self.model, messages = messages.len(), "requesting completion");
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Completion(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Completion(format!("API error {status}: {body}")));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| Error::Completion(format!("malformed response: {e}")))?;
        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Completion("response carried no message content".into()))
    }
}
