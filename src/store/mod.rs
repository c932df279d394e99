//! Vector store collaborator
//!
//! A collection of points, each keyed by an opaque id and carrying two
//! independently searchable cosine vector spaces plus a payload record.

pub mod memory;
pub mod qdrant;

use crate::core::error::Result;
use crate::core::types::{Payload, ScoredMatch, VectorSpace};
use ahash::AHashMap;
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

/// A point to upsert
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPoint {
    pub id: Uuid,
    pub vectors: AHashMap<VectorSpace, Vec<f32>>,
    pub payload: Payload,
}

impl FeedbackPoint {
    pub fn new(payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            vectors: AHashMap::new(),
            payload,
        }
    }

    pub fn with_vector(mut self, space: VectorSpace, vector: Vec<f32>) -> Self {
        self.vectors.insert(space, vector);
        self
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection with both vector spaces if it does not exist
    async fn ensure_collection(&self) -> Result<()>;

    async fn upsert(&self, points: Vec<FeedbackPoint>) -> Result<()>;

    /// Nearest neighbours in one vector space, best score first
    async fn search(
        &self,
        vector: &[f32],
        space: VectorSpace,
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>>;

    /// Up to `limit` payloads in store-defined order
    async fn list(&self, limit: usize) -> Result<Vec<Payload>>;
}
