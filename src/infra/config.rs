// src/infra/config.rs — Configuration loading (TOML + environment overrides)
//
// Controllers are independent of the host process and load configuration
// themselves: first from config.toml, then from RENGLO_* environment
// variables. Environment values win, so deployments can run without a
// config file at all.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::errors::RengloError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// SMTP settings (optional section in config.toml).
    #[serde(default)]
    pub email: Option<EmailConfig>,

    #[serde(default)]
    pub websocket: WebSocketConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub handlers: HandlersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Whitelabel name scoping this deployment.
    pub wl_name: String,
    pub base_url: Option<String>,
    pub fe_base_url: Option<String>,
    pub doc_base_url: Option<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            wl_name: "renglo".into(),
            base_url: None,
            fe_base_url: None,
            doc_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub check_token_expiration: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            check_token_expiration: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Push endpoint for live chat connections. Empty means disabled.
    #[serde(default)]
    pub connections_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlersConfig {
    /// Extensions whose handlers run as external services.
    #[serde(default)]
    pub external: Vec<String>,
    /// External extensions that are configured but switched off.
    #[serde(default)]
    pub deactivated: Vec<String>,
    /// Base URL the external runner POSTs to; the endpoint per extension
    /// follows the `{base_url}/{extension}-handlers` convention.
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            external: Vec::new(),
            deactivated: Vec::new(),
            base_url: "http://localhost:9000".into(),
            timeout_seconds: 30,
        }
    }
}

impl Config {
    /// Load config: file first (when present), then environment overrides,
    /// then validate the critical keys.
    pub fn load() -> Result<Self, RengloError> {
        let path = paths::config_file_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, RengloError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| RengloError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Environment variables overwrite file-based config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RENGLO_WL_NAME") {
            self.workspace.wl_name = v;
        }
        if let Ok(v) = std::env::var("RENGLO_BASE_URL") {
            self.workspace.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("RENGLO_FE_BASE_URL") {
            self.workspace.fe_base_url = Some(v);
        }
        if let Ok(v) = std::env::var("RENGLO_DOC_BASE_URL") {
            self.workspace.doc_base_url = Some(v);
        }
        if let Ok(v) = std::env::var("RENGLO_CHECK_TOKEN_EXPIRATION") {
            self.auth.check_token_expiration = v != "false" && v != "0";
        }
        if let Ok(v) = std::env::var("RENGLO_WEBSOCKET_CONNECTIONS") {
            self.websocket.connections_url = v;
        }
        if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            self.openai.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("RENGLO_OPENAI_BASE_URL") {
            self.openai.base_url = v;
        }
        if let Ok(v) = std::env::var("RENGLO_OPENAI_MODEL") {
            self.openai.model = v;
        }
        if let Ok(v) = std::env::var("RENGLO_EXTERNAL_HANDLERS") {
            self.handlers.external = split_list(&v);
        }
        if let Ok(v) = std::env::var("RENGLO_EXTERNAL_HANDLERS_DEACTIVATED") {
            self.handlers.deactivated = split_list(&v);
        }
        if let Ok(v) = std::env::var("RENGLO_EXTERNAL_HANDLERS_BASE_URL") {
            self.handlers.base_url = v;
        }
    }

    /// Critical configuration must be present regardless of source.
    pub fn validate(&self) -> Result<(), RengloError> {
        if self.workspace.wl_name.trim().is_empty() {
            return Err(RengloError::Config(
                "workspace.wl_name must not be empty: set it in config.toml \
                 or via RENGLO_WL_NAME"
                    .into(),
            ));
        }
        if self.handlers.timeout_seconds == 0 {
            return Err(RengloError::Config(
                "handlers.timeout_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Parse a comma-separated list, trimming and lowercasing entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
