//! Sequential plan execution
//!
//! Steps run strictly in order; each step's only input is the previous
//! step's output. The first failure aborts the plan and no step is retried.

use crate::core::config::EngineConfig;
use crate::core::error::{QueryError, Result};
use crate::engine::Collaborators;
use crate::functions::{Arity, CallEnv, FunctionLibrary};
use crate::pipeline::Context;
use crate::plan::Plan;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle of one plan execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Clone)]
pub struct Executor {
    library: Arc<FunctionLibrary>,
    collaborators: Collaborators,
    config: Arc<EngineConfig>,
}

impl Executor {
    pub fn new(
        library: Arc<FunctionLibrary>,
        collaborators: Collaborators,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            library,
            collaborators,
            config,
        }
    }

    pub fn library(&self) -> &FunctionLibrary {
        &self.library
    }

    /// Validate and run `plan`, returning the final step's context
    pub async fn execute(&self, plan: &Plan) -> Result<Context> {
        let mut state = ExecutionState::Idle;
        debug!(?state, steps = plan.len(), "executing plan");

        self.library.validate(plan)?;

        state = ExecutionState::Running;
        debug!(?state);
        match self.run_steps(plan).await {
            Ok(context) => {
                state = ExecutionState::Completed;
                info!(?state, result = %context.kind(), "plan finished");
                Ok(context)
            }
            Err(e) => {
                state = ExecutionState::Failed;
                warn!(?state, "plan failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_steps(&self, plan: &Plan) -> Result<Context> {
        let env = CallEnv {
            collaborators: &self.collaborators,
            config: &self.config,
        };
        let mut context: Option<Context> = None;

        for (index, step) in plan.steps.iter().enumerate() {
            let function = self
                .library
                .get(&step.function)
                .ok_or_else(|| QueryError::UnknownFunction {
                    index,
                    name: step.function.clone(),
                })?;

            let input = match function.signature().arity {
                Arity::ContextFree => None,
                Arity::ContextConsuming => context.take(),
            };
            debug!(index, function = %step.function, "running step");

            let output = function
                .call(&env, input, &step.args)
                .await
                .map_err(|e| QueryError::StepExecution {
                    index,
                    function: step.function.clone(),
                    source: Box::new(e),
                })?;
            debug!(index, produced = %output.kind(), "step done");
            context = Some(output);
        }

        context.ok_or_else(|| QueryError::InvalidPlan {
            step: None,
            reason: "plan has no steps".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{payload, Harness};
    use crate::functions::{PipelineFunction, Signature, StepRole};
    use crate::pipeline::{ContextKind, Table};
    use crate::plan::{Args, Step};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records the context it receives and appends one row
    struct Probe {
        seen: Mutex<Vec<Option<usize>>>,
    }

    const PROBE: Signature = Signature {
        name: "probe",
        arity: Arity::ContextConsuming,
        accepts: &[ContextKind::Table],
        produces: ContextKind::Table,
        required_args: &[],
        role: StepRole::Transform,
    };

    #[async_trait]
    impl PipelineFunction for Probe {
        fn signature(&self) -> &Signature {
            &PROBE
        }

        async fn call(&self, _env: &CallEnv<'_>, input: Option<Context>, _args: &Args) -> Result<Context> {
            let table = input.map(|c| c.into_table()).transpose()?;
            self.seen.lock().unwrap().push(table.as_ref().map(Table::len));
            let mut rows = table.map(Table::into_rows).unwrap_or_default();
            rows.push(payload(json!({"text": "probe"})));
            Ok(Context::Table(Table::from_rows(rows)))
        }
    }

    fn corpus() -> Vec<crate::core::types::Payload> {
        [1, 4, 5, 2, 6, 3, 4, 1, 2, 5]
            .iter()
            .enumerate()
            .map(|(i, level)| {
                payload(json!({
                    "ID": i,
                    "service_demended_hebrew": "שינוי כתובת",
                    "Level": level,
                    "text": format!("feedback {}", i),
                    "CreationDate": "2024-05-01",
                }))
            })
            .collect()
    }

    fn executor(harness: &Harness, library: FunctionLibrary) -> Executor {
        Executor::new(
            Arc::new(library),
            harness.collaborators().clone(),
            Arc::new(harness.config.clone()),
        )
    }

    #[tokio::test]
    async fn test_count_example() {
        let harness = Harness::new().with_listed(corpus());
        let plan = Plan::new(vec![
            Step::new("fetch_all_feedbacks"),
            Step::new("filter_by_level").arg("operator", "gt").arg("value", 3),
            Step::new("count_records"),
            Step::new("render_table").arg("columns", vec!["total_count"]),
        ]);
        let result = executor(&harness, FunctionLibrary::builtin())
            .execute(&plan)
            .await
            .unwrap();
        assert_eq!(
            result.into_json(),
            json!({"type": "table", "data": [{"total_count": 4}]})
        );
    }

    #[tokio::test]
    async fn test_each_step_receives_previous_output() {
        let harness = Harness::new().with_listed(corpus());
        let probe = Arc::new(Probe {
            seen: Mutex::new(Vec::new()),
        });
        let mut library = FunctionLibrary::builtin();
        library.register(probe.clone());

        let plan = Plan::new(vec![
            Step::new("fetch_all_feedbacks").arg("limit", 3),
            Step::new("probe"),
            Step::new("probe"),
            Step::new("count_records"),
        ]);
        let result = executor(&harness, library).execute(&plan).await.unwrap();
        assert_eq!(*probe.seen.lock().unwrap(), vec![Some(3), Some(4)]);
        assert_eq!(result.into_json(), json!([{"total_count": 5}]));
    }

    #[tokio::test]
    async fn test_unknown_function_stops_before_any_step() {
        let harness = Harness::new().with_failing_store();
        let plan = Plan::new(vec![
            Step::new("fetch_all_feedbacks"),
            Step::new("explode"),
        ]);
        let err = executor(&harness, FunctionLibrary::builtin())
            .execute(&plan)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownFunction { index: 1, .. }));
    }

    #[tokio::test]
    async fn test_step_failure_is_wrapped() {
        let harness = Harness::new().with_listed(corpus());
        let plan = Plan::new(vec![
            Step::new("fetch_all_feedbacks"),
            Step::new("filter_by_value")
                .arg("field", "Score")
                .arg("operator", "gt")
                .arg("value", 1),
        ]);
        let err = executor(&harness, FunctionLibrary::builtin())
            .execute(&plan)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Step 1 (filter_by_value) failed: Column not found: Score");
    }

    #[tokio::test]
    async fn test_collaborator_failure_aborts_plan() {
        let harness = Harness::new().with_failing_store();
        let plan = Plan::new(vec![Step::new("fetch_all_feedbacks"), Step::new("count_records")]);
        let err = executor(&harness, FunctionLibrary::builtin())
            .execute(&plan)
            .await
            .unwrap_err();
        assert!(err.is_collaborator());
        assert!(matches!(err, QueryError::StepExecution { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_semantic_plan_renders_analysis() {
        let harness = Harness::new().with_listed(corpus()).with_replies(vec![
            Ok("{\"summary\": \"string\"}".into()),
            Ok("{\"summary\": \"תהליך איטי\"}".into()),
        ]);
        let plan = Plan::new(vec![
            Step::new("fetch_all_feedbacks"),
            Step::new("filter_by_service").arg("service_name", "כתובת"),
            Step::new("get_texts"),
            Step::new("semantic_dynamic").arg("prompt", "מה הבעיה?"),
            Step::new("render_text"),
        ]);
        let result = executor(&harness, FunctionLibrary::builtin())
            .execute(&plan)
            .await
            .unwrap();
        assert_eq!(result.into_json(), json!({"summary": "תהליך איטי"}));
    }
}
