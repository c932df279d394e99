//! Shared domain types: feedback records, vector spaces and search hits

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque record stored alongside a vector point
pub type Payload = Map<String, Value>;

/// Column holding the resolved (Hebrew) service label
pub const SERVICE_COLUMN: &str = "service_demended_hebrew";
/// Ordinal severity column
pub const LEVEL_COLUMN: &str = "Level";
/// Free-text column
pub const TEXT_COLUMN: &str = "text";
pub const CREATION_DATE_COLUMN: &str = "CreationDate";
pub const ID_COLUMN: &str = "ID";
/// Similarity score column added by semantic filtering
pub const SCORE_COLUMN: &str = "score";
/// Single column produced by `count_records`
pub const TOTAL_COUNT_COLUMN: &str = "total_count";

/// Columns every feedback table carries, in display order
pub const FEEDBACK_COLUMNS: [&str; 4] =
    [SERVICE_COLUMN, LEVEL_COLUMN, TEXT_COLUMN, CREATION_DATE_COLUMN];

/// One citizen feedback entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    #[serde(rename = "ID")]
    pub id: Value,
    pub text: String,
    #[serde(rename = "Level")]
    pub level: i64,
    #[serde(rename = "service_demended_hebrew")]
    pub service: String,
    #[serde(rename = "CreationDate")]
    pub created_at: String,
}

impl FeedbackRecord {
    /// Convert into the payload layout stored in the vector collection
    pub fn into_payload(self) -> Payload {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Payload::new(),
        }
    }
}

/// The two independent similarity spaces of a feedback point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorSpace {
    /// Embedding of the feedback text
    TextVector,
    /// Embedding of the resolved service label
    ServiceVector,
}

impl VectorSpace {
    pub const ALL: [VectorSpace; 2] = [VectorSpace::TextVector, VectorSpace::ServiceVector];

    pub fn name(self) -> &'static str {
        match self {
            VectorSpace::TextVector => "text_vector",
            VectorSpace::ServiceVector => "service_vector",
        }
    }
}

impl fmt::Display for VectorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Embedding mode; queries and indexed passages are embedded differently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    Query,
    Passage,
}

impl EmbedMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EmbedMode::Query => "query",
            EmbedMode::Passage => "passage",
        }
    }
}

/// A similarity-search hit
///
/// Scores are only comparable within the search call that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub payload: Payload,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_payload_uses_column_names() {
        let record = FeedbackRecord {
            id: json!(17),
            text: "האתר איטי".into(),
            level: 2,
            service: "שינוי כתובת".into(),
            created_at: "2024-03-01".into(),
        };
        let payload = record.into_payload();
        assert_eq!(payload.get(ID_COLUMN), Some(&json!(17)));
        assert_eq!(payload.get(LEVEL_COLUMN), Some(&json!(2)));
        assert_eq!(payload.get(SERVICE_COLUMN), Some(&json!("שינוי כתובת")));
        assert_eq!(payload.get(CREATION_DATE_COLUMN), Some(&json!("2024-03-01")));
    }

    #[test]
    fn test_vector_space_names() {
        assert_eq!(VectorSpace::TextVector.name(), "text_vector");
        assert_eq!(VectorSpace::ServiceVector.to_string(), "service_vector");
        assert_eq!(EmbedMode::Passage.as_str(), "passage");
    }
}
