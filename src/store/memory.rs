//! In-process vector store with exact cosine search

use crate::core::error::Result;
use crate::core::types::{Payload, ScoredMatch, VectorSpace};
use crate::store::{FeedbackPoint, VectorStore};
use async_trait::async_trait;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use tokio::sync::RwLock;

/// Vector store held in memory; listing follows insertion order
#[derive(Debug, Default)]
pub struct MemoryStore {
    points: RwLock<Vec<FeedbackPoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<FeedbackPoint>) -> Result<()> {
        let mut stored = self.points.write().await;
        for point in points {
            match stored.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point,
                None => stored.push(point),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        space: VectorSpace,
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>> {
        let stored = self.points.read().await;
        let mut hits: Vec<ScoredMatch> = stored
            .iter()
            .filter_map(|point| {
                let candidate = point.vectors.get(&space)?;
                Some(ScoredMatch {
                    payload: point.payload.clone(),
                    score: cosine_similarity(vector, candidate),
                })
            })
            .collect();
        hits.sort_by_key(|hit| Reverse(OrderedFloat(hit.score)));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Payload>> {
        let stored = self.points.read().await;
        Ok(stored
            .iter()
            .take(limit)
            .map(|p| p.payload.clone())
            .collect())
    }
}
