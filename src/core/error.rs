use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    /// The planner returned text that is not a well-formed plan.
    #[error("Planning error: {reason}")]
    Planning { reason: String, raw: String },

    #[error("Invalid plan{}: {reason}", fmt_step(.step))]
    InvalidPlan { step: Option<usize>, reason: String },

    #[error("Unknown function '{name}' at step {index}")]
    UnknownFunction { index: usize, name: String },

    #[error("Step {index} ({function}) failed: {source}")]
    StepExecution {
        index: usize,
        function: String,
        #[source]
        source: Box<QueryError>,
    },

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Context mismatch: expected {expected}, got {actual}")]
    ContextMismatch { expected: String, actual: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn fmt_step(step: &Option<usize>) -> String {
    match step {
        Some(i) => format!(" at step {}", i),
        None => String::new(),
    }
}

impl QueryError {
    pub fn invalid_argument(name: &str, reason: impl Into<String>) -> Self {
        QueryError::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures of the vector store, embedding or chat gateways,
    /// including when wrapped by a failing step.
    pub fn is_collaborator(&self) -> bool {
        match self {
            QueryError::Llm(_) | QueryError::Embedding(_) | QueryError::VectorStore(_) => true,
            QueryError::StepExecution { source, .. } => source.is_collaborator(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
