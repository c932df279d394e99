//! Function library
//!
//! Every plan step names one registered function. A function declares its
//! signature up front: whether it consumes the incoming context, which context
//! variants it accepts, which it produces, and which arguments it requires.
//! Plans are checked against these signatures before any step runs.

pub mod aggregate;
pub mod analysis;
pub mod args;
pub mod fetch;
pub mod filter;
pub mod relevance;
pub mod render;

#[cfg(test)]
pub(crate) mod test_support;

use crate::core::config::EngineConfig;
use crate::core::error::{QueryError, Result};
use crate::engine::Collaborators;
use crate::pipeline::{Context, ContextKind};
use crate::plan::{validate_plan, Args, Operation, Plan};
use ahash::AHashMap;
use async_trait::async_trait;
use std::sync::Arc;

/// How a function relates to the incoming context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Produces a context from nothing; only valid as the first step
    ContextFree,
    /// Transforms the previous step's context
    ContextConsuming,
}

/// Structural role used by plan validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRole {
    Source,
    Transform,
    TextExtraction,
    Analysis,
    TableRender,
    TextRender,
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub name: &'static str,
    pub arity: Arity,
    pub accepts: &'static [ContextKind],
    pub produces: ContextKind,
    pub required_args: &'static [&'static str],
    pub role: StepRole,
}

impl Signature {
    pub fn accepts_kind(&self, kind: ContextKind) -> bool {
        self.accepts.contains(&kind)
    }
}

/// Per-call environment
pub struct CallEnv<'a> {
    pub collaborators: &'a Collaborators,
    pub config: &'a EngineConfig,
}

#[async_trait]
pub trait PipelineFunction: Send + Sync {
    fn signature(&self) -> &Signature;

    /// `input` is `None` exactly when the signature is [`Arity::ContextFree`]
    async fn call(&self, env: &CallEnv<'_>, input: Option<Context>, args: &Args)
        -> Result<Context>;
}

const TABLE: &[ContextKind] = &[ContextKind::Table];

const FETCH_ALL_FEEDBACKS: Signature = Signature {
    name: "fetch_all_feedbacks",
    arity: Arity::ContextFree,
    accepts: &[],
    produces: ContextKind::Table,
    required_args: &[],
    role: StepRole::Source,
};

const FILTER_BY_LEVEL: Signature = Signature {
    name: "filter_by_level",
    arity: Arity::ContextConsuming,
    accepts: TABLE,
    produces: ContextKind::Table,
    required_args: &["operator", "value"],
    role: StepRole::Transform,
};

const FILTER_BY_VALUE: Signature = Signature {
    name: "filter_by_value",
    arity: Arity::ContextConsuming,
    accepts: TABLE,
    produces: ContextKind::Table,
    required_args: &["field", "operator", "value"],
    role: StepRole::Transform,
};

const FILTER_BY_SERVICE: Signature = Signature {
    name: "filter_by_service",
    arity: Arity::ContextConsuming,
    accepts: TABLE,
    produces: ContextKind::Table,
    required_args: &["service_name"],
    role: StepRole::Transform,
};

const FILTER_BY_TEXT_CONTAINS: Signature = Signature {
    name: "filter_by_text_contains",
    arity: Arity::ContextConsuming,
    accepts: TABLE,
    produces: ContextKind::Table,
    required_args: &["keyword"],
    role: StepRole::Transform,
};

const FILTER_BY_TEXT_SEMANTIC: Signature = Signature {
    name: "filter_by_text_semantic",
    arity: Arity::ContextConsuming,
    accepts: TABLE,
    produces: ContextKind::Table,
    required_args: &["query"],
    role: StepRole::Transform,
};

const GROUP_BY_SERVICE: Signature = Signature {
    name: "group_by_service",
    arity: Arity::ContextConsuming,
    accepts: TABLE,
    produces: ContextKind::Table,
    required_args: &[],
    role: StepRole::Transform,
};

const SORT_RESULTS: Signature = Signature {
    name: "sort_results",
    arity: Arity::ContextConsuming,
    accepts: TABLE,
    produces: ContextKind::Table,
    required_args: &[],
    role: StepRole::Transform,
};

const COUNT_RECORDS: Signature = Signature {
    name: "count_records",
    arity: Arity::ContextConsuming,
    accepts: TABLE,
    produces: ContextKind::Table,
    required_args: &[],
    role: StepRole::Transform,
};

const GET_TEXTS: Signature = Signature {
    name: "get_texts",
    arity: Arity::ContextConsuming,
    accepts: TABLE,
    produces: ContextKind::TextList,
    required_args: &[],
    role: StepRole::TextExtraction,
};

const SEMANTIC_DYNAMIC: Signature = Signature {
    name: "semantic_dynamic",
    arity: Arity::ContextConsuming,
    accepts: &[ContextKind::TextList, ContextKind::Table],
    produces: ContextKind::Analysis,
    required_args: &["prompt"],
    role: StepRole::Analysis,
};

const RENDER_TABLE: Signature = Signature {
    name: "render_table",
    arity: Arity::ContextConsuming,
    accepts: TABLE,
    produces: ContextKind::Rendered,
    required_args: &[],
    role: StepRole::TableRender,
};

const RENDER_TEXT: Signature = Signature {
    name: "render_text",
    arity: Arity::ContextConsuming,
    accepts: &ContextKind::ALL,
    produces: ContextKind::Rendered,
    required_args: &[],
    role: StepRole::TextRender,
};

/// Static signature of a built-in operation
pub fn builtin_signature(op: Operation) -> &'static Signature {
    match op {
        Operation::FetchAllFeedbacks => &FETCH_ALL_FEEDBACKS,
        Operation::FilterByLevel => &FILTER_BY_LEVEL,
        Operation::FilterByValue => &FILTER_BY_VALUE,
        Operation::FilterByService => &FILTER_BY_SERVICE,
        Operation::FilterByTextContains => &FILTER_BY_TEXT_CONTAINS,
        Operation::FilterByTextSemantic => &FILTER_BY_TEXT_SEMANTIC,
        Operation::GroupByService => &GROUP_BY_SERVICE,
        Operation::SortResults => &SORT_RESULTS,
        Operation::CountRecords => &COUNT_RECORDS,
        Operation::GetTexts => &GET_TEXTS,
        Operation::SemanticDynamic => &SEMANTIC_DYNAMIC,
        Operation::RenderTable => &RENDER_TABLE,
        Operation::RenderText => &RENDER_TEXT,
    }
}

/// A built-in operation registered under its canonical name
struct Builtin(Operation);

fn require_input(input: Option<Context>) -> Result<Context> {
    input.ok_or_else(|| QueryError::ContextMismatch {
        expected: "a context".into(),
        actual: "none".into(),
    })
}

fn require_table(input: Option<Context>) -> Result<crate::pipeline::Table> {
    require_input(input)?.into_table()
}

#[async_trait]
impl PipelineFunction for Builtin {
    fn signature(&self) -> &Signature {
        builtin_signature(self.0)
    }

    async fn call(
        &self,
        env: &CallEnv<'_>,
        input: Option<Context>,
        args: &Args,
    ) -> Result<Context> {
        match self.0 {
            Operation::FetchAllFeedbacks => fetch::fetch_all_feedbacks(env, args)
                .await
                .map(Context::Table),
            Operation::FilterByLevel => {
                filter::filter_by_level(require_table(input)?, args).map(Context::Table)
            }
            Operation::FilterByValue => {
                filter::filter_by_value_step(require_table(input)?, args).map(Context::Table)
            }
            Operation::FilterByService => {
                filter::filter_by_service(env, require_table(input)?, args)
                    .await
                    .map(Context::Table)
            }
            Operation::FilterByTextContains => {
                filter::filter_by_text_contains(require_table(input)?, args).map(Context::Table)
            }
            Operation::FilterByTextSemantic => {
                relevance::filter_by_text_semantic(env, require_table(input)?, args)
                    .await
                    .map(Context::Table)
            }
            Operation::GroupByService => {
                aggregate::group_by_service_step(require_table(input)?, args).map(Context::Table)
            }
            Operation::SortResults => {
                aggregate::sort_results_step(require_table(input)?, args).map(Context::Table)
            }
            Operation::CountRecords => Ok(Context::Table(aggregate::count_records(
                &require_table(input)?,
            ))),
            Operation::GetTexts => {
                aggregate::get_texts(&require_table(input)?).map(Context::TextList)
            }
            Operation::SemanticDynamic => {
                analysis::semantic_dynamic(env, require_input(input)?, args)
                    .await
                    .map(Context::Analysis)
            }
            Operation::RenderTable => {
                render::render_table(require_table(input)?, args).map(Context::Rendered)
            }
            Operation::RenderText => Ok(Context::Rendered(render::render_text(require_input(
                input,
            )?))),
        }
    }
}

/// Registry of callable functions, keyed by name
#[derive(Clone, Default)]
pub struct FunctionLibrary {
    functions: AHashMap<String, Arc<dyn PipelineFunction>>,
}

impl FunctionLibrary {
    /// An empty library
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard library with every built-in operation
    pub fn builtin() -> Self {
        let mut library = Self::empty();
        for op in Operation::ALL {
            library.register(Arc::new(Builtin(op)));
        }
        library
    }

    /// Register a function under its signature name, replacing any previous one
    pub fn register(&mut self, function: Arc<dyn PipelineFunction>) {
        let name = function.signature().name.to_string();
        self.functions.insert(name, function);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PipelineFunction>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn validate(&self, plan: &Plan) -> Result<()> {
        validate_plan(plan, self)
    }
}

impl std::fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionLibrary")
            .field("functions", &self.names())
            .finish()
    }
}
