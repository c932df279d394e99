//! Row-oriented table threaded between pipeline steps
//!
//! A table has an ordered column set and rows keyed by column name. Every row
//! carries exactly the table's columns; cells absent from the source record
//! are stored as JSON null.

use crate::core::error::{QueryError, Result};
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a table over a fixed column set, normalizing every row to it
    pub fn with_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| normalize_row(&columns, row))
            .collect();
        Self { columns, rows }
    }

    /// Create a table whose columns are the union of row keys in first-seen order
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::from_rows_with_leading(&[], rows)
    }

    /// Like [`Table::from_rows`], with `leading` columns always present and first
    pub fn from_rows_with_leading(leading: &[&str], rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = leading.iter().map(|c| c.to_string()).collect();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self::with_rows(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(QueryError::MissingColumn(name.to_string()))
        }
    }

    /// Keep only rows matching `keep`; columns are unchanged
    pub fn retain_rows(mut self, mut keep: impl FnMut(&Row) -> bool) -> Self {
        self.rows.retain(|row| keep(row));
        self
    }

    /// Project onto the requested columns, silently dropping unknown names
    /// and repeats
    pub fn project(self, requested: &[String]) -> Self {
        let mut columns: Vec<String> = Vec::with_capacity(requested.len());
        for column in requested {
            if self.has_column(column) && !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        Self::with_rows(columns, self.rows)
    }

    /// Cell values of one column, in row order
    pub fn values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&Value::Null))
    }
}

fn normalize_row(columns: &[String], mut row: Row) -> Row {
    let mut out = Row::new();
    for column in columns {
        let value = row.remove(column).unwrap_or(Value::Null);
        out.insert(column.clone(), value);
    }
    out
}

/// Numeric view of a cell; numeric strings are coerced
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Textual view of a cell; null has none
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
