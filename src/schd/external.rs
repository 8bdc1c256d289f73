// src/schd/external.rs — External handler dispatch over HTTP
//
// Extensions listed in handlers.external run as separate services instead of
// in-process handlers. Endpoint convention: {base_url}/{extension}-handlers.
// The service replies with a {success, output, error} envelope.

use serde::Deserialize;
use std::time::Duration;

use crate::infra::config::HandlersConfig;
use crate::infra::errors::RengloError;

#[derive(Debug, Deserialize)]
struct ExternalEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct ExternalHandlers {
    extensions: Vec<String>,
    deactivated: Vec<String>,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ExternalHandlers {
    pub fn from_config(config: &HandlersConfig) -> Self {
        Self {
            extensions: config.external.clone(),
            deactivated: config.deactivated.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
            client: reqwest::Client::new(),
        }
    }

    /// Whether the extension has external handlers configured at all.
    pub fn is_external(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.extensions.iter().any(|e| *e == extension)
    }

    /// Configured and not switched off.
    pub fn is_active(&self, extension: &str) -> bool {
        let lowered = extension.to_lowercase();
        self.is_external(extension) && !self.deactivated.iter().any(|e| *e == lowered)
    }

    pub fn endpoint(&self, extension: &str) -> String {
        format!("{}/{}-handlers", self.base_url, extension.to_lowercase())
    }

    /// POST the payload to the extension service and unwrap the envelope.
    pub async fn run(
        &self,
        extension: &str,
        handler: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, RengloError> {
        let url = self.endpoint(extension);
        let body = serde_json::json!({
            "handler": handler,
            "payload": payload,
        });

        tracing::debug!("Calling external handler {extension}/{handler} at {url}");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RengloError::ExternalHandler {
                extension: extension.to_string(),
                handler: handler.to_string(),
                message: format!("request failed: {e}"),
                retriable: true,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RengloError::ExternalHandler {
                extension: extension.to_string(),
                handler: handler.to_string(),
                message: format!("HTTP {status}: {body}"),
                retriable: status.is_server_error(),
            });
        }

        let envelope: ExternalEnvelope =
            response
                .json()
                .await
                .map_err(|e| RengloError::ExternalHandler {
                    extension: extension.to_string(),
                    handler: handler.to_string(),
                    message: format!("invalid response envelope: {e}"),
                    retriable: false,
                })?;

        if !envelope.success {
            return Err(RengloError::ExternalHandler {
                extension: extension.to_string(),
                handler: handler.to_string(),
                message: envelope
                    .error
                    .unwrap_or_else(|| "external handler execution failed".into()),
                retriable: false,
            });
        }

        Ok(envelope.output.unwrap_or(serde_json::Value::Null))
    }
}
