use crate::core::error::Result;
use crate::functions::args::optional_str_list;
use crate::pipeline::{Context, Rendered, Table};
use crate::plan::Args;
use serde_json::{Map, Value};
use tracing::debug;

/// Keys that mark an analysis mapping as already presentable
const RESULT_KEYS: [&str; 5] = [
    "summary",
    "main_issues",
    "recommendations",
    "sentiment",
    "topics",
];

/// Render a table envelope, projected onto `columns` when given
pub fn render_table(table: Table, args: &Args) -> Result<Rendered> {
    if table.is_empty() {
        debug!("no rows to render");
        return Ok(Rendered::table(Vec::new()));
    }
    let table = match optional_str_list(args, "columns")? {
        Some(columns) if !columns.is_empty() => table.project(&columns),
        _ => table,
    };
    debug!(
        "rendering {} rows x {} columns",
        table.len(),
        table.columns().len()
    );
    Ok(Rendered::table(table.into_rows()))
}

fn looks_rendered(map: &Map<String, Value>) -> bool {
    map.contains_key("type") || RESULT_KEYS.iter().any(|k| map.contains_key(*k))
}

/// Render any context as text, passing presentable results through
pub fn render_text(input: Context) -> Rendered {
    match input {
        Context::Rendered(rendered) => rendered,
        Context::Analysis(map) if looks_rendered(&map) => Rendered::Analysis(map),
        Context::Analysis(map) => Rendered::text(Value::Object(map).to_string()),
        Context::TextList(texts) => Rendered::text(texts.join("\n")),
        Context::Table(table) => {
            let rows: Vec<Value> = table.into_rows().into_iter().map(Value::Object).collect();
            Rendered::text(Value::Array(rows).to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{feedback_table, payload};
    use serde_json::json;

    #[test]
    fn test_render_empty_table_ignores_columns() {
        let rendered = render_table(
            feedback_table(&[]),
            &payload(json!({"columns": ["nope", "Level"]})),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(rendered).unwrap(),
            json!({"type": "table", "data": []})
        );
    }

    #[test]
    fn test_render_table_projects_known_columns() {
        let rendered = render_table(
            feedback_table(&[("svc", 4, "x")]),
            &payload(json!({"columns": ["Level", "unknown"]})),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(rendered).unwrap(),
            json!({"type": "table", "data": [{"Level": 4}]})
        );
    }

    #[test]
    fn test_render_table_defaults_to_all_columns() {
        let rendered = render_table(feedback_table(&[("svc", 4, "x")]), &Args::new()).unwrap();
        let value = serde_json::to_value(rendered).unwrap();
        assert_eq!(value["data"][0].as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_render_text_passthrough_and_wrapping() {
        let analysis = payload(json!({"summary": "slow", "items": []}));
        assert_eq!(
            render_text(Context::Analysis(analysis.clone())),
            Rendered::Analysis(analysis)
        );

        let error = payload(json!({"error": "no texts found for analysis"}));
        assert_eq!(
            render_text(Context::Analysis(error)),
            Rendered::text("{\"error\":\"no texts found for analysis\"}")
        );

        assert_eq!(
            render_text(Context::TextList(vec!["a".into(), "b".into()])),
            Rendered::text("a\nb")
        );

        let already = Rendered::text("done");
        assert_eq!(render_text(Context::Rendered(already.clone())), already);
    }
}
