//! Plan execution engine
//!
//! question -> Planner -> Plan -> Executor(Plan, FunctionLibrary) -> result

pub mod executor;
pub mod service;

use crate::llm::{ChatModel, Embedder};
use crate::store::VectorStore;
use std::sync::Arc;

pub use executor::{ExecutionState, Executor};
pub use service::{ErrorResponse, HealthResponse, QueryResponse, QueryService};

/// External services the library functions talk to
///
/// Constructed once and handed to the engine; functions never reach for
/// global client handles.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatModel>,
}

impl Collaborators {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
        }
    }
}
