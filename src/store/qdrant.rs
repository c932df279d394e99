//! Qdrant vector store on the official client

use crate::core::config::StoreConfig;
use crate::core::error::{QueryError, Result};
use crate::core::types::{Payload, ScoredMatch, VectorSpace};
use crate::store::{FeedbackPoint, VectorStore};
use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, ListValue, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, Struct, UpsertPointsBuilder, Value, VectorParamsBuilder,
    VectorsConfigBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Clone)]
pub struct QdrantStore {
    client: Qdrant,
    url: String,
    collection: String,
    vector_size: usize,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .field("vector_size", &self.vector_size)
            .finish()
    }
}

fn store_error(op: &str, collection: &str, e: impl std::fmt::Display) -> QueryError {
    QueryError::VectorStore(format!("{} failed for collection '{}': {}", op, collection, e))
}

impl QdrantStore {
    /// Build a client; no connection is made until the first call
    pub fn new(
        url: &str,
        collection: impl Into<String>,
        vector_size: usize,
        api_key: Option<String>,
    ) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(|e| QueryError::VectorStore(format!("qdrant client init failed for {}: {}", url, e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
            collection: collection.into(),
            vector_size,
        })
    }

    /// Build from configuration; `QDRANT_API_KEY` is sent when set
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(
            &config.url,
            &config.collection,
            config.vector_size,
            std::env::var("QDRANT_API_KEY").ok(),
        )
    }
}

fn vectors_config(vector_size: usize) -> VectorsConfigBuilder {
    let mut config = VectorsConfigBuilder::default();
    for space in VectorSpace::ALL {
        config.add_named_vector_params(
            space.name(),
            VectorParamsBuilder::new(vector_size as u64, Distance::Cosine),
        );
    }
    config
}

fn point_struct(point: FeedbackPoint) -> PointStruct {
    let vectors: HashMap<String, Vec<f32>> = point
        .vectors
        .into_iter()
        .map(|(space, vector)| (space.name().to_string(), vector))
        .collect();
    let payload: HashMap<String, Value> = point
        .payload
        .into_iter()
        .map(|(k, v)| (k, json_to_value(v)))
        .collect();
    PointStruct::new(point.id.to_string(), vectors, payload)
}

fn json_to_value(v: serde_json::Value) -> Value {
    let kind = match v {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(b) => Kind::BoolValue(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Kind::IntegerValue(i),
            None => Kind::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => Kind::StringValue(s),
        serde_json::Value::Array(items) => Kind::ListValue(ListValue {
            values: items.into_iter().map(json_to_value).collect(),
        }),
        serde_json::Value::Object(map) => Kind::StructValue(Struct {
            fields: map.into_iter().map(|(k, v)| (k, json_to_value(v))).collect(),
        }),
    };
    Value { kind: Some(kind) }
}

fn value_to_json(v: Value) -> serde_json::Value {
    match v.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::from(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(x)) => serde_json::Value::from(x),
        Some(Kind::StringValue(s)) => serde_json::Value::from(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields.into_iter().map(|(k, v)| (k, value_to_json(v))).collect(),
        ),
    }
}

fn payload_to_json(payload: HashMap<String, Value>) -> Payload {
    payload
        .into_iter()
        .map(|(k, v)| (k, value_to_json(v)))
        .collect()
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| store_error("collection lookup", &self.collection, e))?;
        if exists {
            debug!(collection = %self.collection, "collection already exists");
            return Ok(());
        }

        info!(collection = %self.collection, "creating collection");
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(vectors_config(self.vector_size)),
            )
            .await
            .map_err(|e| store_error("create collection", &self.collection, e))?;
        Ok(())
    }

    async fn upsert(&self, points: Vec<FeedbackPoint>) -> Result<()> {
        let count = points.len();
        let points: Vec<PointStruct> = points.into_iter().map(point_struct).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| store_error("upsert", &self.collection, e))?;
        debug!(count, "upsert done");
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        space: VectorSpace,
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>> {
        debug!(space = %space, limit = top_k, "qdrant search");
        let request = SearchPointsBuilder::new(&self.collection, vector.to_vec(), top_k as u64)
            .vector_name(space.name())
            .with_payload(true);
        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| store_error("search", &self.collection, e))?;
        debug!(found = response.result.len(), "qdrant search done");
        Ok(response
            .result
            .into_iter()
            .map(|point| ScoredMatch {
                payload: payload_to_json(point.payload),
                score: point.score,
            })
            .collect())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Payload>> {
        let mut payloads = Vec::new();
        let mut offset = None;

        while payloads.len() < limit {
            let page_size = u32::try_from(limit - payloads.len()).unwrap_or(u32::MAX);
            let mut request = ScrollPointsBuilder::new(&self.collection)
                .limit(page_size)
                .with_payload(true)
                .with_vectors(false);
            if let Some(next) = offset.take() {
                request = request.offset(next);
            }
            let page = self
                .client
                .scroll(request)
                .await
                .map_err(|e| store_error("scroll", &self.collection, e))?;
            let exhausted = page.result.is_empty();
            payloads.extend(page.result.into_iter().map(|p| payload_to_json(p.payload)));

            match page.next_page_offset {
                Some(next) if !exhausted => offset = Some(next),
                _ => break,
            }
        }

        payloads.truncate(limit);
        Ok(payloads)
    }
}
