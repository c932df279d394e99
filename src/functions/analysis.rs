//! Two-stage semantic analysis
//!
//! Stage one asks the model to design the JSON shape of the answer from the
//! question alone. Stage two fills that shape from the feedback texts. Output
//! that does not parse is returned as an error mapping instead of failing the
//! plan; gateway failures still propagate.

use crate::core::error::Result;
use crate::functions::aggregate::get_texts;
use crate::functions::args::{optional_str_list, required_str};
use crate::functions::CallEnv;
use crate::llm::ChatMessage;
use crate::pipeline::Context;
use crate::plan::Args;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const NO_TEXTS: &str = "no texts found for analysis";

const SCHEMA_SYSTEM_PROMPT: &str = "\
You are a schema planner. You receive a question, usually in Hebrew, about a \
collection of citizen feedback. Design the ideal JSON structure for its answer.

Rules:
1. The schema is a single valid JSON object.
2. It names every key the analyst must return.
3. It gives each value a type: string, number, list[string], list[number], \
object or list[object].
4. Keep it minimal but expressive.
5. No markdown and no code fences.
6. Return only the schema.";

const ANALYST_SYSTEM_PROMPT: &str = "\
You are an analytics engine for Hebrew citizen feedback.

Your only output is one valid JSON object. It starts with { and ends with }.
No markdown, no code fences, no backticks. Use double-quoted JSON strings only.

Fill exactly the schema you are given, using only the feedback texts provided.
Prefer arrays of objects over long free text. Keys stay in English; Hebrew is \
for user-facing values.

When no schema key fits, fall back to:
{\"summary\": \"...\", \"items\": [{\"title\": \"...\", \"description\": \"...\", \
\"analysis\": \"...\", \"score\": null, \"extra\": {}}]}

When asked to pair feedback with responses, return:
{\"reviews\": [{\"review_text\": \"...\", \"response\": \"...\"}], \"total_reviews\": 0}";

/// A stage whose output could not be used
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisFailure {
    Schema { reason: String, raw: String },
    Answer { reason: String, raw: String },
}

impl AnalysisFailure {
    /// Diagnostic mapping returned as the step result
    pub fn into_map(self) -> Map<String, Value> {
        let (message, raw) = match self {
            AnalysisFailure::Schema { reason, raw } => {
                (format!("Schema creation failed: {}", reason), raw)
            }
            AnalysisFailure::Answer { reason, raw } => {
                (format!("Answer creation failed: {}", reason), raw)
            }
        };
        let mut map = Map::new();
        map.insert("error".into(), Value::String(message));
        map.insert("raw".into(), Value::String(raw));
        map
    }
}

pub fn error_map(message: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("error".into(), Value::String(message.to_string()));
    map
}

/// Remove markdown code-fence markers the model sometimes adds
pub fn strip_fences(raw: &str) -> String {
    raw.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse model output as a JSON object
pub fn parse_object(raw: &str) -> std::result::Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(&strip_fences(raw)) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", kind_of(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// At most `budget` characters of `text`, cut on a character boundary
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn source_texts(input: Context, args: &Args) -> Result<Option<Vec<String>>> {
    if let Some(texts) = optional_str_list(args, "texts")? {
        return Ok(Some(texts));
    }
    match input {
        Context::TextList(texts) => Ok(Some(texts)),
        Context::Table(table) => get_texts(&table).map(Some),
        _ => Ok(None),
    }
}

fn schema_messages(prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SCHEMA_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Question:\n\"{}\"\n\nDesign the ideal JSON schema for the answer to this question.",
            prompt
        )),
    ]
}

fn analyst_messages(prompt: &str, schema: &Map<String, Value>, texts: &str) -> Result<Vec<ChatMessage>> {
    let schema = serde_json::to_string(schema)?;
    Ok(vec![
        ChatMessage::system(ANALYST_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Question: \"{}\"\n\nSchema:\n{}\n\nFeedback texts:\n{}\n\nReturn valid JSON that matches the schema exactly.",
            prompt, schema, texts
        )),
    ])
}

/// Answer `prompt` over the input texts
pub async fn semantic_dynamic(env: &CallEnv<'_>, input: Context, args: &Args) -> Result<Map<String, Value>> {
    let prompt = required_str(args, "prompt")?;
    let texts = match source_texts(input, args)? {
        Some(texts) if !texts.is_empty() => texts,
        _ => {
            warn!("semantic analysis has no input texts");
            return Ok(error_map(NO_TEXTS));
        }
    };
    let settings = &env.config.analysis;
    let chat = &env.collaborators.chat;

    debug!("designing answer schema");
    let schema_raw = chat
        .chat(&schema_messages(prompt), settings.schema_max_tokens)
        .await?;
    let schema = match parse_object(&schema_raw) {
        Ok(schema) => schema,
        Err(reason) => {
            warn!("schema stage returned unusable output: {}", reason);
            return Ok(AnalysisFailure::Schema {
                reason,
                raw: schema_raw,
            }
            .into_map());
        }
    };

    let joined = texts.join("\n");
    let evidence = truncate_chars(&joined, settings.text_budget_chars);
    debug!(
        texts = texts.len(),
        chars = evidence.chars().count(),
        "filling answer schema"
    );
    let answer_raw = chat
        .chat(
            &analyst_messages(prompt, &schema, evidence)?,
            settings.fill_max_tokens,
        )
        .await?;
    match parse_object(&answer_raw) {
        Ok(answer) => Ok(answer),
        Err(reason) => {
            warn!("answer stage returned unusable output: {}", reason);
            Ok(AnalysisFailure::Answer {
                reason,
                raw: answer_raw,
            }
            .into_map())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{feedback_table, payload, Harness};
    use serde_json::json;

    fn texts(items: &[&str]) -> Context {
        Context::TextList(items.iter().map(|s| s.to_string()).collect())
    }

    fn prompt_args() -> Args {
        payload(json!({"prompt": "מה הבעיות העיקריות?"}))
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_object_rejects_non_objects() {
        assert!(parse_object("[1, 2]").unwrap_err().contains("an array"));
        assert!(parse_object("not json").is_err());
        assert_eq!(parse_object("```{\"k\": true}```").unwrap()["k"], json!(true));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("שלום עולם", 4), "שלום");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_two_stage_success() {
        let harness = Harness::new().with_replies(vec![
            Ok("```json\n{\"summary\": \"string\", \"main_issues\": \"list[string]\"}\n```".into()),
            Ok("{\"summary\": \"האתר איטי\", \"main_issues\": [\"איטיות\"]}".into()),
        ]);
        let out = semantic_dynamic(&harness.env(), texts(&["האתר איטי", "נתקע בתשלום"]), &prompt_args())
            .await
            .unwrap();
        assert_eq!(out["summary"], json!("האתר איטי"));

        let calls = harness.chat.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, 90_000);
        assert_eq!(calls[1].1, 100_000);
        let fill_prompt = &calls[1].0[1].content;
        assert!(fill_prompt.contains("main_issues"));
        assert!(fill_prompt.contains("נתקע בתשלום"));
    }

    #[tokio::test]
    async fn test_schema_failure_returns_error_mapping() {
        let harness = Harness::new().with_replies(vec![Ok("I think the schema is...".into())]);
        let out = semantic_dynamic(&harness.env(), texts(&["x"]), &prompt_args())
            .await
            .unwrap();
        assert!(out["error"].as_str().unwrap().starts_with("Schema creation failed"));
        assert_eq!(out["raw"], json!("I think the schema is..."));
        assert_eq!(harness.chat.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_failure_returns_error_mapping() {
        let harness = Harness::new().with_replies(vec![
            Ok("{\"summary\": \"string\"}".into()),
            Ok("{\"summary\": ".into()),
        ]);
        let out = semantic_dynamic(&harness.env(), texts(&["x"]), &prompt_args())
            .await
            .unwrap();
        assert!(out["error"].as_str().unwrap().starts_with("Answer creation failed"));
        assert_eq!(out["raw"], json!("{\"summary\": "));
    }

    #[tokio::test]
    async fn test_gateway_failure_propagates() {
        let harness = Harness::new().with_replies(vec![Err("503".into())]);
        let err = semantic_dynamic(&harness.env(), texts(&["x"]), &prompt_args())
            .await
            .unwrap_err();
        assert!(err.is_collaborator());
    }

    #[tokio::test]
    async fn test_no_texts_short_circuits() {
        let harness = Harness::new();
        let out = semantic_dynamic(&harness.env(), texts(&[]), &prompt_args())
            .await
            .unwrap();
        assert_eq!(out, error_map(NO_TEXTS));
        assert!(harness.chat.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_texts_argument_overrides_context_and_budget_applies() {
        let mut harness = Harness::new().with_replies(vec![
            Ok("{\"summary\": \"string\"}".into()),
            Ok("{\"summary\": \"ok\"}".into()),
        ]);
        harness.config.analysis.text_budget_chars = 5;
        let mut args = prompt_args();
        args.insert("texts".into(), json!(["abcdefgh"]));
        let table = Context::Table(feedback_table(&[("svc", 1, "from table")]));
        semantic_dynamic(&harness.env(), table, &args).await.unwrap();

        let calls = harness.chat.calls.lock().unwrap();
        let fill_prompt = &calls[1].0[1].content;
        assert!(fill_prompt.contains("abcde\n"));
        assert!(!fill_prompt.contains("abcdef"));
        assert!(!fill_prompt.contains("from table"));
    }
}
