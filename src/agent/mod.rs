// src/agent/mod.rs — Agent-facing services: chat threads, live push, LLM

pub mod chat;
pub mod llm;
pub mod ws;

pub use chat::ChatController;
pub use llm::{ChatMessage, LlmClient};
pub use ws::WebSocketClient;
