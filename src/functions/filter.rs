//! Row filters over feedback tables

use crate::core::error::{QueryError, Result};
use crate::core::types::{EmbedMode, VectorSpace, LEVEL_COLUMN, SERVICE_COLUMN, TEXT_COLUMN};
use crate::functions::args::{required_number, required_str};
use crate::functions::CallEnv;
use crate::pipeline::table::{numeric, text_of};
use crate::pipeline::Table;
use crate::plan::Args;
use std::str::FromStr;
use tracing::{debug, warn};

/// Comparison operators accepted from plans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
}

impl FromStr for Comparison {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lt" => Ok(Comparison::Lt),
            "lte" => Ok(Comparison::Lte),
            "eq" => Ok(Comparison::Eq),
            "gte" => Ok(Comparison::Gte),
            "gt" => Ok(Comparison::Gt),
            other => Err(QueryError::invalid_argument(
                "operator",
                format!("unknown operator '{}' (expected lt, lte, eq, gte, gt)", other),
            )),
        }
    }
}

impl Comparison {
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Lte => lhs <= rhs,
            Comparison::Eq => lhs == rhs,
            Comparison::Gte => lhs >= rhs,
            Comparison::Gt => lhs > rhs,
        }
    }
}

/// Keep rows whose `field` compares true against `value`
///
/// Cells that are null or not numeric never match.
pub fn filter_by_value(table: Table, field: &str, op: Comparison, value: f64) -> Result<Table> {
    table.require_column(field)?;
    let before = table.len();
    let filtered = table.retain_rows(|row| {
        row.get(field)
            .and_then(numeric)
            .map_or(false, |cell| op.holds(cell, value))
    });
    debug!(
        "{}/{} rows after {} {:?} {}",
        filtered.len(),
        before,
        field,
        op,
        value
    );
    Ok(filtered)
}

pub fn filter_by_value_step(table: Table, args: &Args) -> Result<Table> {
    let field = required_str(args, "field")?;
    let op: Comparison = required_str(args, "operator")?.parse()?;
    let value = required_number(args, "value")?;
    filter_by_value(table, field, op, value)
}

pub fn filter_by_level(table: Table, args: &Args) -> Result<Table> {
    let op: Comparison = required_str(args, "operator")?.parse()?;
    let value = required_number(args, "value")?;
    filter_by_value(table, LEVEL_COLUMN, op, value)
}

/// Case-insensitive substring match on one column
pub fn filter_contains(table: Table, column: &str, needle: &str) -> Result<Table> {
    table.require_column(column)?;
    let needle = needle.to_lowercase();
    Ok(table.retain_rows(|row| {
        row.get(column)
            .and_then(text_of)
            .map_or(false, |cell| cell.to_lowercase().contains(&needle))
    }))
}

pub fn filter_by_text_contains(table: Table, args: &Args) -> Result<Table> {
    let keyword = required_str(args, "keyword")?;
    let filtered = filter_contains(table, TEXT_COLUMN, keyword)?;
    debug!("filtered by keyword '{}': {} matches", keyword, filtered.len());
    Ok(filtered)
}

/// Keep rows whose `column` value is exactly one of `labels`
pub fn filter_by_membership(table: Table, column: &str, labels: &[String]) -> Result<Table> {
    table.require_column(column)?;
    Ok(table.retain_rows(|row| {
        row.get(column)
            .and_then(|v| v.as_str())
            .map_or(false, |cell| labels.iter().any(|l| l == cell))
    }))
}

/// Resolve a free-form service mention to stored service labels
///
/// Searches the service-label vector space and returns up to
/// `service_resolution.top_k` distinct labels, best match first.
pub async fn resolve_service_labels(env: &CallEnv<'_>, service_name: &str) -> Result<Vec<String>> {
    let settings = &env.config.service_resolution;
    let vector = env
        .collaborators
        .embedder
        .embed(service_name, EmbedMode::Query)
        .await?;
    let hits = env
        .collaborators
        .store
        .search(&vector, VectorSpace::ServiceVector, settings.top_k)
        .await?;

    let mut labels: Vec<String> = Vec::new();
    for hit in hits {
        if settings.min_score.map_or(false, |min| hit.score < min) {
            continue;
        }
        let Some(label) = hit.payload.get(SERVICE_COLUMN).and_then(|v| v.as_str()) else {
            continue;
        };
        if !label.is_empty() && !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
        if labels.len() == settings.top_k {
            break;
        }
    }
    Ok(labels)
}

/// Two-tier service filter
///
/// Rows are matched by exact membership in the resolved label set. When no
/// label resolves, or resolution itself fails, the filter degrades to a
/// case-insensitive substring match on the label column. A table without a
/// label column passes through unchanged.
pub async fn filter_by_service(env: &CallEnv<'_>, table: Table, args: &Args) -> Result<Table> {
    let service_name = required_str(args, "service_name")?;

    if !table.has_column(SERVICE_COLUMN) {
        warn!(
            "no '{}' column to filter on, leaving {} rows as they are",
            SERVICE_COLUMN,
            table.len()
        );
        return Ok(table);
    }

    let resolved = match resolve_service_labels(env, service_name).await {
        Ok(labels) => labels,
        Err(e) => {
            warn!("service resolution for '{}' failed: {}", service_name, e);
            Vec::new()
        }
    };

    let filtered = if resolved.is_empty() {
        debug!("no label match for '{}', using substring match", service_name);
        filter_contains(table, SERVICE_COLUMN, service_name)?
    } else {
        debug!("resolved '{}' to {:?}", service_name, resolved);
        filter_by_membership(table, SERVICE_COLUMN, &resolved)?
    };

    debug!(
        "filtered {} rows with the service name '{}'",
        filtered.len(),
        service_name
    );
    Ok(filtered)
}
