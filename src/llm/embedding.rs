//! Embedding gateway
//!
//! Request payload (OpenAI-compatible, with retriever extensions):
//! `{ "input": [text], "model": "...", "encoding_format": "float",
//!    "input_type": "query" | "passage", "truncate": "NONE" }`
//!
//! Response payload: `{ "data": [{ "embedding": [...] }] }`

use crate::core::config::EmbeddingConfig;
use crate::core::error::{QueryError, Result};
use crate::core::types::EmbedMode;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Embedding gateway contract
///
/// Returned vectors must match the dimensionality of the vector store spaces.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>>;
}

/// HTTP embedding client
pub struct HttpEmbedder {
    client: Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

impl HttpEmbedder {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            model,
            api_key,
        }
    }

    /// Build from configuration; falls back to `LLM_API_KEY` when the
    /// embedding-specific variable is unset
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .or_else(|_| std::env::var("LLM_API_KEY"))
            .map_err(|_| QueryError::Embedding(format!("{} not set", config.api_key_env)))?;
        Ok(Self::new(
            api_key,
            config.api_url.clone(),
            config.model.clone(),
        ))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: [&'a str; 1],
    model: &'a str,
    encoding_format: &'static str,
    input_type: &'static str,
    truncate: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            input: [text],
            model: &self.model,
            encoding_format: "float",
            input_type: mode.as_str(),
            truncate: "NONE",
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| QueryError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(QueryError::Embedding(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Embedding(format!("invalid embedding response: {}", e)))?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default();
        if vector.is_empty() {
            return Err(QueryError::Embedding("empty embedding returned".into()));
        }
        debug!(mode = mode.as_str(), dim = vector.len(), "embedding done");
        Ok(vector)
    }
}
