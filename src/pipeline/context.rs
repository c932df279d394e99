//! Values threaded between plan steps

use crate::core::error::{QueryError, Result};
use crate::pipeline::table::{Row, Table};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Discriminant of [`Context`], used for static plan validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Table,
    TextList,
    Analysis,
    Rendered,
}

impl ContextKind {
    pub const ALL: [ContextKind; 4] = [
        ContextKind::Table,
        ContextKind::TextList,
        ContextKind::Analysis,
        ContextKind::Rendered,
    ];
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextKind::Table => "Table",
            ContextKind::TextList => "TextList",
            ContextKind::Analysis => "Analysis",
            ContextKind::Rendered => "Rendered",
        };
        f.write_str(name)
    }
}

/// Final result envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    Table { data: Vec<Row> },
    Text { content: String },
}

/// Output of a render step
///
/// Analysis mappings that already look like a result are passed through
/// without being wrapped in an envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rendered {
    Envelope(Envelope),
    Analysis(Map<String, Value>),
}

impl Rendered {
    pub fn table(data: Vec<Row>) -> Self {
        Rendered::Envelope(Envelope::Table { data })
    }

    pub fn text(content: impl Into<String>) -> Self {
        Rendered::Envelope(Envelope::Text {
            content: content.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Context {
    Table(Table),
    TextList(Vec<String>),
    Analysis(Map<String, Value>),
    Rendered(Rendered),
}

impl Context {
    pub fn kind(&self) -> ContextKind {
        match self {
            Context::Table(_) => ContextKind::Table,
            Context::TextList(_) => ContextKind::TextList,
            Context::Analysis(_) => ContextKind::Analysis,
            Context::Rendered(_) => ContextKind::Rendered,
        }
    }

    pub fn into_table(self) -> Result<Table> {
        match self {
            Context::Table(table) => Ok(table),
            other => Err(mismatch(ContextKind::Table, other.kind())),
        }
    }

    /// JSON form returned to callers
    pub fn into_json(self) -> Value {
        match self {
            Context::Table(table) => {
                Value::Array(table.into_rows().into_iter().map(Value::Object).collect())
            }
            Context::TextList(texts) => {
                let mut map = Map::new();
                map.insert(
                    "texts".into(),
                    Value::Array(texts.into_iter().map(Value::String).collect()),
                );
                Value::Object(map)
            }
            Context::Analysis(map) => Value::Object(map),
            Context::Rendered(rendered) => match rendered {
                Rendered::Analysis(map) => Value::Object(map),
                Rendered::Envelope(envelope) => {
                    serde_json::to_value(envelope).unwrap_or(Value::Null)
                }
            },
        }
    }
}

pub(crate) fn mismatch(expected: ContextKind, actual: ContextKind) -> QueryError {
    QueryError::ContextMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
