// src/agent/llm.rs — OpenAI-compatible chat completion client

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::infra::config::OpenAiConfig;
use crate::infra::errors::RengloError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct LlmClient {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Run one chat completion and return the assistant text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RengloError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RengloError::Config("openai.api_key is not set (OPENAI_API_KEY)".into())
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
        });

        debug!("Chat completion request to {} ({})", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RengloError::Provider {
                message: format!("HTTP {status}: {text}"),
                retriable: status.is_server_error()
                    || status == reqwest::StatusCode::TOO_MANY_REQUESTS,
            });
        }

        let parsed: CompletionResponse =
            response.json().await.map_err(|e| RengloError::Provider {
                message: format!("invalid completion response: {e}"),
                retriable: false,
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RengloError::Provider {
                message: "completion response contained no choices".into(),
                retriable: false,
            })
    }
}

/// Models often wrap JSON answers in markdown fences; strip them so the
/// result parses.
pub fn clean_json_response(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
