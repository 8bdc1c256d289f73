// src/infra/errors.rs — Error types for renglo-lib

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RengloError {
    // Lookup errors
    #[error("Document not found: {portfolio}/{org}/{ring}/{index}")]
    NotFound {
        portfolio: String,
        org: String,
        ring: String,
        index: String,
    },

    #[error("Entity not found: {idx}/{id}")]
    EntityNotFound { idx: String, id: String },

    #[error("User '{email}' not found")]
    UserNotFound { email: String },

    #[error("Rule '{0}' not found")]
    RuleNotFound(String),

    #[error("Blueprint '{name}' (version {version}) not found in '{portfolio}'")]
    BlueprintNotFound {
        portfolio: String,
        name: String,
        version: String,
    },

    // Scheduler / handler errors
    #[error("Payload is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid trigger '{0}': expected one of manual, call, cron")]
    InvalidTrigger(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Handler name '{0}' must be 'extension/handler'")]
    InvalidHandlerName(String),

    #[error("Handler '{0}' is not registered")]
    HandlerNotFound(String),

    #[error("Handler '{handler}' failed: {message}")]
    HandlerFailed { handler: String, message: String },

    #[error("External handler '{extension}/{handler}' error: {message}")]
    ExternalHandler {
        extension: String,
        handler: String,
        message: String,
        retriable: bool,
    },

    // Auth errors
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("User '{email}' already exists")]
    UserExists { email: String },

    // LLM errors
    #[error("Model provider error: {message}")]
    Provider { message: String, retriable: bool },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RengloError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RengloError::ExternalHandler {
                retriable: true,
                ..
            } | RengloError::Provider {
                retriable: true,
                ..
            }
        )
    }

    /// True for errors caused by a missing record rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RengloError::NotFound { .. }
                | RengloError::EntityNotFound { .. }
                | RengloError::UserNotFound { .. }
                | RengloError::RuleNotFound(_)
                | RengloError::BlueprintNotFound { .. }
        )
    }
}
