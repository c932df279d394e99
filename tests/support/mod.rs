//! Shared fixtures for integration tests
//!
//! - `TokenEmbedder`: deterministic bag-of-words embedding, so texts sharing
//!   words are close and unrelated texts are orthogonal
//! - `ScriptedChat`: hands out canned replies in order and records prompts
//! - `seeded_store`: a `MemoryStore` indexed the way the ingestion side does it

#![allow(dead_code)]

use async_trait::async_trait;
use feedback_query::core::error::{QueryError, Result};
use feedback_query::core::types::{EmbedMode, FeedbackRecord, VectorSpace};
use feedback_query::engine::Collaborators;
use feedback_query::llm::{ChatMessage, ChatModel, Embedder};
use feedback_query::store::{FeedbackPoint, MemoryStore, VectorStore};
use feedback_query::{EngineConfig, QueryService};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const DIMENSIONS: usize = 256;

pub struct TokenEmbedder;

fn bucket(token: &str) -> usize {
    let hash = token
        .bytes()
        .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
    hash as usize % DIMENSIONS
}

pub fn embed_tokens(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSIONS];
    for token in text.split_whitespace() {
        let token: String = token
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if !token.is_empty() {
            vector[bucket(&token)] += 1.0;
        }
    }
    vector
}

#[async_trait]
impl Embedder for TokenEmbedder {
    async fn embed(&self, text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
        Ok(embed_tokens(text))
    }
}

#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn chat(&self, messages: &[ChatMessage], _max_tokens: u32) -> Result<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| QueryError::Llm("no scripted reply left".into()))
    }
}

/// `(service, level, text)` rows
pub const CORPUS: &[(&str, i64, &str)] = &[
    ("שינוי כתובת", 1, "the address form is slow and crashes"),
    ("שינוי כתובת", 4, "quick and easy address update"),
    ("שינוי כתובת", 2, "slow upload of documents"),
    ("שינוי כתובת", 5, "great service"),
    ("חידוש ויזה", 3, "error 404 on the payment page"),
    ("חידוש ויזה", 5, "fast approval"),
    ("חידוש ויזה", 2, "login fails with error message"),
    ("דרכון ביומטרי", 4, "appointment booking was simple"),
    ("דרכון ביומטרי", 1, "waiting times are too long"),
    ("דרכון ביומטרי", 3, "excellent staff"),
];

pub fn records() -> Vec<FeedbackRecord> {
    CORPUS
        .iter()
        .enumerate()
        .map(|(i, (service, level, text))| FeedbackRecord {
            id: json!(i + 1),
            text: text.to_string(),
            level: *level,
            service: service.to_string(),
            created_at: format!("2024-03-{:02}", i + 1),
        })
        .collect()
}

pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.ensure_collection().await.unwrap();
    let points = records()
        .into_iter()
        .map(|record| {
            let text_vector = embed_tokens(&record.text);
            let service_vector = embed_tokens(&record.service);
            FeedbackPoint::new(record.into_payload())
                .with_vector(VectorSpace::TextVector, text_vector)
                .with_vector(VectorSpace::ServiceVector, service_vector)
        })
        .collect();
    store.upsert(points).await.unwrap();
    store
}

pub async fn collaborators(chat: Arc<ScriptedChat>) -> Collaborators {
    Collaborators::new(seeded_store().await, Arc::new(TokenEmbedder), chat)
}

pub async fn service(chat: Arc<ScriptedChat>) -> QueryService {
    service_with_config(chat, EngineConfig::default()).await
}

pub async fn service_with_config(chat: Arc<ScriptedChat>, config: EngineConfig) -> QueryService {
    QueryService::new(collaborators(chat).await, config)
}
