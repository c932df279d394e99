//! Feedback Query - natural-language questions over citizen feedback
//!
//! A planner model turns a question into a declarative plan of steps drawn
//! from a fixed function library. The plan is validated, then executed step
//! by step over tables of feedback records held in a vector store.

pub mod core;
pub mod engine;
pub mod functions;
pub mod llm;
pub mod pipeline;
pub mod plan;
pub mod store;

pub use crate::core::config::EngineConfig;
pub use crate::core::error::{QueryError, Result};
pub use crate::engine::{Collaborators, Executor, QueryService};
pub use crate::functions::FunctionLibrary;
pub use crate::pipeline::Context;
pub use crate::plan::{Plan, Step};
