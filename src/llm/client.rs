//! Async LLM client for planning and analysis calls
//!
//! This is a model-agnostic HTTP client for calling chat APIs.
//! Supports both Anthropic and OpenAI-compatible APIs (NVIDIA, DeepSeek, etc).

use crate::core::config::LlmConfig;
use crate::core::error::{QueryError, Result};
use crate::llm::{ChatMessage, ChatModel};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// API format type
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

/// Async LLM client for making API calls
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    temperature: f32,
    api_format: ApiFormat,
}

impl LlmClient {
    /// Create a new LLM client with explicit configuration
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        let api_format = Self::detect_api_format(&api_url);
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
            temperature: LlmConfig::default().temperature,
            api_format,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Detect API format from URL
    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }

    /// Create a client from configuration, reading the key from the named env var
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| QueryError::Llm(format!("{} not set", config.api_key_env)))?;
        Ok(
            Self::new(api_key, config.api_url.clone(), config.model.clone())
                .with_temperature(config.temperature),
        )
    }

    async fn chat_anthropic(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String> {
        // Anthropic takes system instructions out of band
        let system = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens,
            temperature: self.temperature,
            system,
            messages: messages.iter().filter(|m| m.role != "system").collect(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| QueryError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(QueryError::Llm(format!("API error: {}", error_text)));
        }

        let completion: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Llm(e.to_string()))?;

        completion
            .content
            .first()
            .map(|c| c.text.trim().to_string())
            .ok_or_else(|| QueryError::Llm("Empty response".into()))
    }

    async fn chat_openai(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String> {
        let request = OpenAIRequest {
            model: &self.model,
            max_tokens,
            temperature: self.temperature,
            messages,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| QueryError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(QueryError::Llm(format!("API error: {}", error_text)));
        }

        let completion: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Llm(e.to_string()))?;

        completion
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(|c| c.trim().to_string())
            .ok_or_else(|| QueryError::Llm("Empty response".into()))
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn chat(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String> {
        debug!(
            model = %self.model,
            messages = messages.len(),
            max_tokens,
            "calling LLM"
        );
        let content = match self.api_format {
            ApiFormat::Anthropic => self.chat_anthropic(messages, max_tokens).await?,
            ApiFormat::OpenAI => self.chat_openai(messages, max_tokens).await?,
        };
        debug!(chars = content.chars().count(), "LLM done");
        Ok(content)
    }
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

// OpenAI-compatible API format
#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
