//! Generative-model and embedding gateways, and the planner built on them

pub mod client;
pub mod embedding;
pub mod planner;

use crate::core::error::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use client::LlmClient;
pub use embedding::{Embedder, HttpEmbedder};
pub use planner::Planner;

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
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
}

/// Generative-model gateway
///
/// One round trip per call; no conversation state is kept between calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String>;
}
