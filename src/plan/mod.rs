//! Declarative execution plans
//!
//! A plan is what the planner model emits and what the executor runs:
//! `{"steps": [{"fn": "<name>", "args": {...}}, ...]}`. Function names are kept
//! as strings so that names outside the library survive parsing and are
//! reported as unknown functions rather than as malformed JSON.

pub mod validate;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub use validate::validate_plan;

/// Argument mapping of a step
pub type Args = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "fn")]
    pub function: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub args: Args,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Args, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Args>::deserialize(deserializer)?.unwrap_or_default())
}

impl Step {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            args: Args::new(),
        }
    }

    /// Builder-style argument setter
    pub fn arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.args.insert(name.to_string(), value.into());
        self
    }
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// The built-in operation set offered to the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchAllFeedbacks,
    FilterByLevel,
    FilterByValue,
    FilterByService,
    FilterByTextContains,
    FilterByTextSemantic,
    GroupByService,
    SortResults,
    CountRecords,
    GetTexts,
    SemanticDynamic,
    RenderTable,
    RenderText,
}

impl Operation {
    pub const ALL: [Operation; 13] = [
        Operation::FetchAllFeedbacks,
        Operation::FilterByLevel,
        Operation::FilterByValue,
        Operation::FilterByService,
        Operation::FilterByTextContains,
        Operation::FilterByTextSemantic,
        Operation::GroupByService,
        Operation::SortResults,
        Operation::CountRecords,
        Operation::GetTexts,
        Operation::SemanticDynamic,
        Operation::RenderTable,
        Operation::RenderText,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::FetchAllFeedbacks => "fetch_all_feedbacks",
            Operation::FilterByLevel => "filter_by_level",
            Operation::FilterByValue => "filter_by_value",
            Operation::FilterByService => "filter_by_service",
            Operation::FilterByTextContains => "filter_by_text_contains",
            Operation::FilterByTextSemantic => "filter_by_text_semantic",
            Operation::GroupByService => "group_by_service",
            Operation::SortResults => "sort_results",
            Operation::CountRecords => "count_records",
            Operation::GetTexts => "get_texts",
            Operation::SemanticDynamic => "semantic_dynamic",
            Operation::RenderTable => "render_table",
            Operation::RenderText => "render_text",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_wire_format() {
        let plan: Plan = serde_json::from_value(json!({
            "steps": [
                {"fn": "fetch_all_feedbacks"},
                {"fn": "filter_by_level", "args": {"operator": "gt", "value": 3}},
                {"fn": "render_text", "args": null}
            ]
        }))
        .unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.steps[0].args.is_empty());
        assert_eq!(plan.steps[1].args.get("operator"), Some(&json!("gt")));
        assert!(plan.steps[2].args.is_empty());
    }

    #[test]
    fn test_missing_steps_key_is_rejected() {
        let result: Result<Plan, _> = serde_json::from_value(json!({"plan": []}));
        assert!(result.is_err());
    }

    #[test]
    fn test_step_builder_serializes_with_fn_key() {
        let step = Step::new("filter_by_text_contains").arg("keyword", "404");
        assert_eq!(
            serde_json::to_value(&step).unwrap(),
            json!({"fn": "filter_by_text_contains", "args": {"keyword": "404"}})
        );
    }

    #[test]
    fn test_operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("drop_table"), None);
    }
}
