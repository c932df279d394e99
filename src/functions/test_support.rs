//! Scripted collaborators for unit tests

use crate::core::config::EngineConfig;
use crate::core::error::{QueryError, Result};
use crate::core::types::{EmbedMode, Payload, ScoredMatch, VectorSpace, SERVICE_COLUMN};
use crate::engine::Collaborators;
use crate::functions::CallEnv;
use crate::llm::{ChatMessage, ChatModel, Embedder};
use crate::pipeline::Table;
use crate::store::{FeedbackPoint, VectorStore};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => panic!("payload must be an object"),
    }
}

/// Feedback table from `(service, level, text)` triples
pub fn feedback_table(rows: &[(&str, i64, &str)]) -> Table {
    let rows = rows
        .iter()
        .enumerate()
        .map(|(i, (service, level, text))| {
            payload(json!({
                "ID": i,
                "service_demended_hebrew": service,
                "Level": level,
                "text": text,
                "CreationDate": "2024-01-01",
            }))
        })
        .collect();
    Table::from_rows_with_leading(&crate::core::types::FEEDBACK_COLUMNS, rows)
}

#[derive(Default)]
pub struct StubStore {
    pub listed: Vec<Payload>,
    pub text_hits: Vec<ScoredMatch>,
    pub service_hits: Vec<ScoredMatch>,
    pub fail: bool,
    pub searches: Mutex<Vec<(VectorSpace, usize)>>,
}

#[async_trait]
impl VectorStore for StubStore {
    async fn ensure_collection(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _points: Vec<FeedbackPoint>) -> Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        _vector: &[f32],
        space: VectorSpace,
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>> {
        if self.fail {
            return Err(QueryError::VectorStore("store offline".into()));
        }
        self.searches.lock().unwrap().push((space, top_k));
        let hits = match space {
            VectorSpace::TextVector => &self.text_hits,
            VectorSpace::ServiceVector => &self.service_hits,
        };
        Ok(hits.iter().take(top_k).cloned().collect())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Payload>> {
        if self.fail {
            return Err(QueryError::VectorStore("store offline".into()));
        }
        Ok(self.listed.iter().take(limit).cloned().collect())
    }
}

pub struct StubEmbedder {
    pub fail: bool,
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
        if self.fail {
            Err(QueryError::Embedding("embedding gateway down".into()))
        } else {
            Ok(vec![1.0, 0.0])
        }
    }
}

/// Replies are handed out in order; every call is recorded
#[derive(Default)]
pub struct ScriptedChat {
    pub replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    pub calls: Mutex<Vec<(Vec<ChatMessage>, u32)>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn chat(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), max_tokens));
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(QueryError::Llm(message)),
            None => Err(QueryError::Llm("no scripted reply left".into())),
        }
    }
}

pub struct Harness {
    pub config: EngineConfig,
    pub store: Arc<StubStore>,
    pub chat: Arc<ScriptedChat>,
    embedder_fails: bool,
    collaborators: Option<Collaborators>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            store: Arc::new(StubStore::default()),
            chat: Arc::new(ScriptedChat::default()),
            embedder_fails: false,
            collaborators: None,
        }
        .rebuild()
    }

    fn rebuild(mut self) -> Self {
        self.collaborators = Some(Collaborators::new(
            self.store.clone(),
            Arc::new(StubEmbedder {
                fail: self.embedder_fails,
            }),
            self.chat.clone(),
        ));
        self
    }

    fn edit_store(mut self, edit: impl FnOnce(&mut StubStore)) -> Self {
        let mut store = StubStore::default();
        {
            let current = &self.store;
            store.listed = current.listed.clone();
            store.text_hits = current.text_hits.clone();
            store.service_hits = current.service_hits.clone();
            store.fail = current.fail;
        }
        edit(&mut store);
        self.store = Arc::new(store);
        self.rebuild()
    }

    pub fn with_listed(self, rows: Vec<Payload>) -> Self {
        self.edit_store(|s| s.listed = rows)
    }

    pub fn with_text_hits(self, hits: Vec<ScoredMatch>) -> Self {
        self.edit_store(|s| s.text_hits = hits)
    }

    /// Service-space hits carrying only a label
    pub fn with_service_hits(self, hits: Vec<(&str, f32)>) -> Self {
        let hits = hits
            .into_iter()
            .map(|(label, score)| ScoredMatch {
                payload: payload(json!({ SERVICE_COLUMN: label })),
                score,
            })
            .collect();
        self.edit_store(|s| s.service_hits = hits)
    }

    pub fn with_failing_store(self) -> Self {
        self.edit_store(|s| s.fail = true)
    }

    pub fn with_failing_embedder(mut self) -> Self {
        self.embedder_fails = true;
        self.rebuild()
    }

    pub fn with_replies(mut self, replies: Vec<std::result::Result<String, String>>) -> Self {
        self.chat = Arc::new(ScriptedChat::new(replies));
        self.rebuild()
    }

    pub fn collaborators(&self) -> &Collaborators {
        self.collaborators
            .as_ref()
            .expect("collaborators are built in the constructor")
    }

    pub fn env(&self) -> CallEnv<'_> {
        CallEnv {
            collaborators: self.collaborators(),
            config: &self.config,
        }
    }
}
