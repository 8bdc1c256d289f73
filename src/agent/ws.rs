// src/agent/ws.rs — Push messages to connected websocket clients
//
// Two deployment shapes: a local connections service that accepts plain
// HTTP posts, or a managed gateway with an @connections management API.
// The shape is inferred from the configured connections URL.

use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::infra::config::WebSocketConfig;
use crate::infra::errors::RengloError;

const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    /// No connections URL configured; sends are no-ops.
    Unconfigured,
    /// Local development service: POST {connection_id, payload} to one URL.
    Local { url: String },
    /// Managed gateway: POST the payload to {base_url}/@connections/{id}.
    Gateway { base_url: String },
}

#[derive(Clone)]
pub struct WebSocketClient {
    mode: Mode,
    client: reqwest::Client,
}

impl WebSocketClient {
    pub fn from_config(config: &WebSocketConfig) -> Self {
        Self {
            mode: detect_mode(&config.connections_url),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.mode != Mode::Unconfigured
    }

    /// Push a payload to one connection. Returns whether the send went
    /// through; delivery failures are logged, never fatal, since chat state
    /// is already persisted by the time we push.
    pub async fn send_message(&self, connection_id: &str, payload: &Value) -> bool {
        match self.try_send(connection_id, payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not push to connection {connection_id}: {e}");
                false
            }
        }
    }

    async fn try_send(&self, connection_id: &str, payload: &Value) -> Result<(), RengloError> {
        match &self.mode {
            Mode::Unconfigured => {
                debug!("No websocket endpoint configured, dropping message");
                Ok(())
            }
            Mode::Local { url } => {
                let body = json!({
                    "connection_id": connection_id,
                    "payload": payload,
                });
                let response = self.client.post(url).json(&body).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RengloError::Config(format!(
                        "local connections service replied {status}"
                    )));
                }
                let reply: Value = response.json().await.unwrap_or(Value::Null);
                if reply.get("ok").and_then(Value::as_bool) != Some(true) {
                    return Err(RengloError::Config(format!(
                        "local connections service rejected the message: {reply}"
                    )));
                }
                Ok(())
            }
            Mode::Gateway { base_url } => {
                let url = format!("{base_url}/@connections/{connection_id}");
                let response = self.client.post(&url).json(payload).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RengloError::Config(format!(
                        "gateway replied {status} for connection {connection_id}"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// A ws:// URL pointing at a local host means the development connections
/// service; it speaks HTTP on the same port, without the /ws route.
fn detect_mode(raw: &str) -> Mode {
    if raw.trim().is_empty() {
        return Mode::Unconfigured;
    }

    let mut http_url = raw
        .trim()
        .replacen("wss://", "https://", 1)
        .replacen("ws://", "http://", 1);
    // Bare host:port would otherwise parse with the host as the scheme
    if !http_url.contains("://") {
        http_url = format!("http://{http_url}");
    }

    let is_local = Url::parse(&http_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| LOCAL_HOSTS.contains(&h)))
        .unwrap_or(false);

    let trimmed = http_url.trim_end_matches('/');
    if is_local {
        Mode::Local {
            url: trimmed.trim_end_matches("/ws").to_string(),
        }
    } else {
        Mode::Gateway {
            base_url: trimmed.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured() {
        assert_eq!(detect_mode(""), Mode::Unconfigured);
        assert_eq!(detect_mode("  "), Mode::Unconfigured);
    }

    #[test]
    fn test_local_detection_strips_ws_route() {
        assert_eq!(
            detect_mode("ws://localhost:8765/ws"),
            Mode::Local {
                url: "http://localhost:8765".into()
            }
        );
        assert_eq!(
            detect_mode("ws://127.0.0.1:8765"),
            Mode::Local {
                url: "http://127.0.0.1:8765".into()
            }
        );
    }

    #[test]
    fn test_schemeless_url_defaults_to_http() {
        assert_eq!(
            detect_mode("localhost:8765"),
            Mode::Local {
                url: "http://localhost:8765".into()
            }
        );
        assert_eq!(
            detect_mode("sockets.example.com/prod"),
            Mode::Gateway {
                base_url: "http://sockets.example.com/prod".into()
            }
        );
    }

    #[test]
    fn test_gateway_detection() {
        assert_eq!(
            detect_mode("wss://sockets.example.com/prod"),
            Mode::Gateway {
                base_url: "https://sockets.example.com/prod".into()
            }
        );
        assert_eq!(
            detect_mode("https://sockets.example.com/prod/"),
            Mode::Gateway {
                base_url: "https://sockets.example.com/prod".into()
            }
        );
    }
}
