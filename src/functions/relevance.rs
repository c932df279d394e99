//! Semantic text filtering with an adaptive relevance cutoff
//!
//! A plain top-k search returns noise when few feedbacks are relevant and
//! misses evidence when many are. Candidates are instead taken from a wide
//! search and cut three ways:
//!
//! 1. strict: keep scores at or above `strict_ratio * max_score`
//! 2. relaxed: if fewer than `min_strict_matches` survive, lower the cutoff
//!    once by `relax_factor` and recompute
//! 3. floor: if fewer than `floor` survive, ignore the cutoff and keep the
//!    `floor` best candidates

use crate::core::config::RelevanceConfig;
use crate::core::error::Result;
use crate::core::types::{
    EmbedMode, ScoredMatch, VectorSpace, CREATION_DATE_COLUMN, ID_COLUMN, LEVEL_COLUMN,
    SCORE_COLUMN, SERVICE_COLUMN, TEXT_COLUMN,
};
use crate::functions::args::required_str;
use crate::functions::CallEnv;
use crate::pipeline::{Row, Table};
use crate::plan::Args;
use ordered_float::OrderedFloat;
use serde_json::Value;
use std::cmp::Reverse;
use tracing::debug;

/// Columns of a semantic filter result, in order
pub const RELEVANCE_COLUMNS: [&str; 6] = [
    ID_COLUMN,
    TEXT_COLUMN,
    LEVEL_COLUMN,
    SERVICE_COLUMN,
    CREATION_DATE_COLUMN,
    SCORE_COLUMN,
];

/// Apply the adaptive cutoff; the result is sorted by descending score
pub fn select_relevant(mut candidates: Vec<ScoredMatch>, config: &RelevanceConfig) -> Vec<ScoredMatch> {
    candidates.sort_by_key(|c| Reverse(OrderedFloat(c.score)));
    let Some(max_score) = candidates.first().map(|c| c.score) else {
        return candidates;
    };

    let surviving = |cutoff: f32| candidates.iter().take_while(|c| c.score >= cutoff).count();

    let mut cutoff = max_score * config.strict_ratio;
    let mut kept = surviving(cutoff);
    debug!(max_score, cutoff, kept, "strict relevance cutoff");

    if kept < config.min_strict_matches {
        cutoff *= config.relax_factor;
        kept = surviving(cutoff);
        debug!(cutoff, kept, "relaxed relevance cutoff");
    }

    if kept < config.floor {
        kept = config.floor.min(candidates.len());
        debug!(kept, "relevance floor applied");
    }

    candidates.truncate(kept);
    candidates
}

fn project(hit: ScoredMatch) -> Row {
    let mut payload = hit.payload;
    let mut row = Row::new();
    for column in &RELEVANCE_COLUMNS[..RELEVANCE_COLUMNS.len() - 1] {
        row.insert(
            column.to_string(),
            payload.remove(*column).unwrap_or(Value::Null),
        );
    }
    row.insert(SCORE_COLUMN.to_string(), Value::from(f64::from(hit.score)));
    row
}

fn relevance_table(rows: Vec<Row>) -> Table {
    Table::with_rows(
        RELEVANCE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    )
}

/// Replace the table with the feedbacks most relevant to `query`
///
/// Candidates come from the whole collection; the incoming rows only matter
/// when the query is blank, in which case they are returned unchanged.
pub async fn filter_by_text_semantic(env: &CallEnv<'_>, table: Table, args: &Args) -> Result<Table> {
    let query = required_str(args, "query")?.trim();
    if query.is_empty() {
        return Ok(table);
    }

    let config = &env.config.relevance;
    let vector = env
        .collaborators
        .embedder
        .embed(query, EmbedMode::Query)
        .await?;
    let candidates = env
        .collaborators
        .store
        .search(&vector, VectorSpace::TextVector, config.breadth)
        .await?;
    debug!(candidates = candidates.len(), "semantic search for '{}'", query);

    let selected = select_relevant(candidates, config);
    Ok(relevance_table(selected.into_iter().map(project).collect()))
}
