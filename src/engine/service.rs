//! Question-answering facade: plan, validate, execute, wrap

use crate::core::config::EngineConfig;
use crate::core::error::{QueryError, Result};
use crate::engine::{Collaborators, Executor};
use crate::functions::FunctionLibrary;
use crate::llm::{HttpEmbedder, LlmClient, Planner};
use crate::plan::Plan;
use crate::store::{QdrantStore, VectorStore};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// Successful answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub status: &'static str,
    pub dsl: Plan,
    pub result: Value,
}

impl QueryResponse {
    pub fn success(dsl: Plan, result: Value) -> Self {
        Self {
            status: "success",
            dsl,
            result,
        }
    }
}

/// Failed answer; the message is the error's own text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl From<&QueryError> for ErrorResponse {
    fn from(e: &QueryError) -> Self {
        Self {
            status: "error",
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

impl HealthResponse {
    /// Liveness only; no collaborator is contacted or constructed
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

pub struct QueryService {
    planner: Planner,
    executor: Executor,
}

impl QueryService {
    pub fn new(collaborators: Collaborators, config: EngineConfig) -> Self {
        Self::with_library(collaborators, config, FunctionLibrary::builtin())
    }

    /// Use a custom function library, e.g. one with extra registered functions
    pub fn with_library(
        collaborators: Collaborators,
        config: EngineConfig,
        library: FunctionLibrary,
    ) -> Self {
        let planner = Planner::new(collaborators.chat.clone(), config.planner.max_tokens);
        let executor = Executor::new(Arc::new(library), collaborators, Arc::new(config));
        Self { planner, executor }
    }

    /// Build the HTTP-backed collaborators described by `config`
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let store: Arc<dyn VectorStore> = Arc::new(QdrantStore::from_config(&config.store)?);
        let embedder = Arc::new(HttpEmbedder::from_config(&config.embedding)?);
        let chat = Arc::new(LlmClient::from_config(&config.llm)?);
        Ok(Self::new(Collaborators::new(store, embedder, chat), config))
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Plan only, without executing
    pub async fn plan(&self, question: &str) -> Result<Plan> {
        let plan = self.planner.plan(question.trim()).await?;
        self.executor.library().validate(&plan)?;
        Ok(plan)
    }

    /// Answer a natural-language question
    pub async fn answer(&self, question: &str) -> Result<QueryResponse> {
        let question = question.trim();
        info!("new question: {}", question);
        let plan = self.planner.plan(question).await.map_err(|e| {
            error!("planning failed: {}", e);
            e
        })?;
        self.run_plan(plan).await
    }

    /// Execute a caller-supplied plan
    pub async fn run_plan(&self, plan: Plan) -> Result<QueryResponse> {
        let context = self.executor.execute(&plan).await.map_err(|e| {
            error!("execution failed: {}", e);
            e
        })?;
        Ok(QueryResponse::success(plan, context.into_json()))
    }

    /// Answer, folding failures into an [`ErrorResponse`]
    pub async fn respond(&self, question: &str) -> std::result::Result<QueryResponse, ErrorResponse> {
        self.answer(question).await.map_err(|e| ErrorResponse::from(&e))
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse::ok()
    }
}
