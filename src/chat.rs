//! OpenAI chat-completions client.
//!
//! [`OpenAIChat`] implements [`ChatModel`] over
//! `POST {base_url}/chat/completions` with non-streaming responses. Sampling
//! temperature comes from `[chat]` (0 by default, for repeatable drafts).

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::{ChatConfig, OpenAIConfig};
use crate::error::{describe_http_error, Error, Result};
use crate::traits::{ChatMessage, ChatModel};

pub struct OpenAIChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAIChat {
    pub fn new(openai: &OpenAIConfig, config: &ChatConfig) -> Result<Self> {
        let api_key = openai.resolve_api_key().ok_or_else(|| {
            Error::Config("OpenAI API key not set (openai.api_key or OPENAI_API_KEY)".to_string())
        })?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: openai.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
        })
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": false,
        });

        debug!(model = %self.model, messages = messages.len(), "sending completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(describe_http_error(&e, self.timeout)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("invalid response body: {}", e)))?;

        extract_content(parsed)
    }
}

fn extract_content(parsed: CompletionResponse) -> Result<String> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Generation("model returned no content".to_string()))
}
