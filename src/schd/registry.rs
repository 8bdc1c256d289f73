// src/schd/registry.rs — Handler registry
//
// Handlers are registered under "extension/name" and invoked with a JSON
// payload. The registry replaces the original's runtime module loading:
// extensions link their handlers in at startup.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::infra::errors::RengloError;

/// A schedulable unit of work contributed by an extension.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Fully-qualified name, `extension/handler`.
    fn name(&self) -> &str;

    async fn run(&self, payload: serde_json::Value) -> anyhow::Result<serde_json::Value>;

    /// Dry-run variant. Defaults to a plain run.
    async fn check(&self, payload: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        self.run(payload).await
    }
}

/// Registry of in-process handlers.
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its own name.
    pub fn register(&mut self, handler: Box<dyn Handler>) {
        let name = handler.name().to_string();
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Handler> {
        self.handlers.get(name).map(|b| b.as_ref())
    }

    /// List all registered handler names.
    pub fn list(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }

    /// Run (or check) a handler by name.
    pub async fn run(
        &self,
        name: &str,
        payload: serde_json::Value,
        check: bool,
    ) -> Result<serde_json::Value, RengloError> {
        let handler = self
            .get(name)
            .ok_or_else(|| RengloError::HandlerNotFound(name.to_string()))?;

        let result = if check {
            handler.check(payload).await
        } else {
            handler.run(payload).await
        };

        result.map_err(|e| RengloError::HandlerFailed {
            handler: name.to_string(),
            message: e.to_string(),
        })
    }
}

/// Split `extension/handler` into its two parts.
pub fn split_handler_name(name: &str) -> Result<(&str, &str), RengloError> {
    match name.split_once('/') {
        Some((ext, handler)) if !ext.is_empty() && !handler.is_empty() && !handler.contains('/') => {
            Ok((ext, handler))
        }
        _ => Err(RengloError::InvalidHandlerName(name.to_string())),
    }
}
