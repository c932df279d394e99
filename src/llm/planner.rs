//! Turn a natural-language question into a plan
//!
//! The model is given a fixed contract listing the function library, the
//! table columns and the rules for composing steps. Its reply is untrusted:
//! anything that is not a JSON object with a `steps` array becomes a
//! planning error carrying the raw reply. Structural checks beyond that
//! belong to plan validation.

use crate::core::error::{QueryError, Result};
use crate::llm::{ChatMessage, ChatModel};
use crate::plan::Plan;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Planner {
    chat: Arc<dyn ChatModel>,
    max_tokens: u32,
}

impl Planner {
    pub fn new(chat: Arc<dyn ChatModel>, max_tokens: u32) -> Self {
        Self { chat, max_tokens }
    }

    /// Ask the model for a plan answering `question`
    pub async fn plan(&self, question: &str) -> Result<Plan> {
        debug!("planning question: {}", question);
        let messages = [
            ChatMessage::system(PLANNER_CONTRACT),
            ChatMessage::user(question),
        ];
        let reply = self.chat.chat(&messages, self.max_tokens).await?;
        let plan = parse_plan(&reply).map_err(|e| {
            warn!("planner reply rejected: {}", e);
            e
        })?;
        debug!("plan has {} steps", plan.len());
        Ok(plan)
    }
}

fn planning_error(reason: impl Into<String>, raw: &str) -> QueryError {
    QueryError::Planning {
        reason: reason.into(),
        raw: raw.to_string(),
    }
}

/// Extract the outermost JSON object from a model reply (handles surrounding text)
fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (start < end).then(|| &response[start..=end])
}

/// Parse a planner reply into a [`Plan`]
pub fn parse_plan(reply: &str) -> Result<Plan> {
    let json = extract_json(reply).ok_or_else(|| planning_error("no JSON object in reply", reply))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| planning_error(format!("reply is not valid JSON: {}", e), reply))?;
    match value.get("steps") {
        Some(Value::Array(_)) => {}
        Some(_) => return Err(planning_error("'steps' is not a list", reply)),
        None => return Err(planning_error("missing 'steps' key", reply)),
    }
    serde_json::from_value(value)
        .map_err(|e| planning_error(format!("malformed step: {}", e), reply))
}

/// Instruction contract sent as the system message
pub const PLANNER_CONTRACT: &str = r#"You are the planning engine of a citizen feedback analysis system.
Convert the user's question (usually Hebrew) into a JSON plan. A plan is an ordered
list of steps; each step receives the output of the previous one.

OUTPUT
Return exactly one JSON object and nothing else: no markdown, no code fences, no comments.
{"steps": [{"fn": "<function name>", "args": {...}}, ...]}

COLUMNS (never invent or translate column names)
The feedback table has exactly: service_demended_hebrew, Level, text, CreationDate.
The only derived columns are avg_Level and count_Level (from group_by_service)
and total_count (from count_records).

FUNCTIONS (use only these)
- fetch_all_feedbacks()                      load the feedback table
- filter_by_level(operator, value)           numeric filter on Level
- filter_by_value(field, operator, value)    numeric filter on any column
- filter_by_service(service_name)            rows of a named service (semantic label resolution)
- filter_by_text_contains(keyword)           literal word inside the text column
- filter_by_text_semantic(query)             feedbacks about a concept or theme
- group_by_service(calc, field)              calc is one of avg, sum, count, max, min, none
- sort_results(order, field)                 order is "asc" or "desc"
- count_records()                            single row with column total_count
- get_texts()                                extract the text column for analysis
- semantic_dynamic(prompt)                   open-ended analysis of the extracted texts
- render_table(columns)                      columns must exist at that point
- render_text()                              final rendering of an analysis

OPERATORS
Allowed operators: "lt", "lte", "eq", "gte", "gt". Never use symbols such as > < >= <= =.
"מעל דירוג 3", "יותר מ־3"        -> operator "gt", value 3
"לפחות 3", "מעל או שווה ל־3"     -> operator "gte", value 3
"מתחת ל־3", "פחות מ־3"           -> operator "lt", value 3
"מתחת או שווה ל־3", "לכל היותר 3" -> operator "lte", value 3
"בדיוק 3"                        -> operator "eq", value 3

SERVICE OR KEYWORD
Use filter_by_service when the question names a service entity:
"בשירות שינוי כתובת", "חידוש ויזה", "דרכון ביומטרי", "בקשת סובסידיה".
Use filter_by_text_contains only when the user wants exact words inside the text:
"שמכיל את המילה '404'", "שכולל 'הודעת שגיאה'".
Use filter_by_text_semantic for topics and problems that are not literal words:
"תלונות על איטיות", "בעיות התחברות", "זמני המתנה".

SEMANTIC OR DETERMINISTIC
Use semantic_dynamic when the question asks for insight, interpretation, themes,
reasons or recommendations: "מה הבעיה העיקרית?", "תן תובנות", "מה כדאי לעשות?".
Questions answered by filtering, counting, grouping, sorting or listing rows must not
use semantic_dynamic: "כמה ביקורות מעל דירוג 3?", "כמה ביקורות יש לכל שירות?".

FLOW
1. The first step is always fetch_all_feedbacks.
2. Filters come before grouping, sorting or analysis.
3. Per-service counts use group_by_service with calc "count".
4. After count_records, render with columns ["total_count"].
5. An analysis plan is: fetch_all_feedbacks, optional filters, get_texts,
   exactly one semantic_dynamic with the full question as prompt, render_text.
6. A factual plan is: fetch_all_feedbacks, filters, optional group/sort/count, render_table.

EXAMPLES
"כמה ביקורות מעל דירוג 3?"
{"steps": [{"fn": "fetch_all_feedbacks"}, {"fn": "filter_by_level", "args": {"operator": "gt", "value": 3}}, {"fn": "count_records"}, {"fn": "render_table", "args": {"columns": ["total_count"]}}]}

"תציג טקסטים שמכילים '404'"
{"steps": [{"fn": "fetch_all_feedbacks"}, {"fn": "filter_by_text_contains", "args": {"keyword": "404"}}, {"fn": "render_table", "args": {"columns": ["text", "Level", "service_demended_hebrew", "CreationDate"]}}]}

"מה הדירוג הממוצע לכל שירות?"
{"steps": [{"fn": "fetch_all_feedbacks"}, {"fn": "group_by_service", "args": {"calc": "avg", "field": "Level"}}, {"fn": "sort_results", "args": {"order": "desc", "field": "avg_Level"}}, {"fn": "render_table", "args": {"columns": ["service_demended_hebrew", "avg_Level"]}}]}

"מה הנושא השלילי העיקרי בשירות שינוי כתובת?"
{"steps": [{"fn": "fetch_all_feedbacks"}, {"fn": "filter_by_service", "args": {"service_name": "שינוי כתובת"}}, {"fn": "get_texts"}, {"fn": "semantic_dynamic", "args": {"prompt": "מה הנושא השלילי העיקרי בשירות שינוי כתובת?"}}, {"fn": "render_text"}]}
"#;
