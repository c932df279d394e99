use crate::core::error::Result;
use crate::core::types::FEEDBACK_COLUMNS;
use crate::functions::args::optional_usize;
use crate::functions::CallEnv;
use crate::pipeline::Table;
use crate::plan::Args;
use tracing::debug;

/// Pull up to `limit` feedback records from the vector store
///
/// Row order is whatever the store's bulk listing returns. The four feedback
/// columns are always present, followed by any extra payload keys.
pub async fn fetch_all_feedbacks(env: &CallEnv<'_>, args: &Args) -> Result<Table> {
    let limit = optional_usize(args, "limit")?.unwrap_or(env.config.fetch.default_limit);
    debug!(limit, "fetching feedbacks");

    let payloads = env.collaborators.store.list(limit).await?;
    let table = Table::from_rows_with_leading(&FEEDBACK_COLUMNS, payloads);

    debug!(rows = table.len(), "fetched feedbacks");
    Ok(table)
}
