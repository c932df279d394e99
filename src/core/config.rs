//! Engine configuration with documented defaults
//!
//! Every tunable constant of the query engine lives here. The file format is
//! TOML; every section is optional and falls back to the defaults below.
//! Secrets are never stored in the file, only the names of the environment
//! variables that hold them.

use crate::core::error::{QueryError, Result};
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration for the query engine and its collaborators
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub planner: PlannerConfig,
    pub analysis: AnalysisConfig,
    pub relevance: RelevanceConfig,
    pub service_resolution: ServiceResolutionConfig,
    pub fetch: FetchConfig,
}

/// Generative-model gateway settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat endpoint. Anthropic URLs use the Messages API, anything else is
    /// treated as OpenAI-compatible.
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://integrate.api.nvidia.com/v1/chat/completions".into(),
            model: "meta/llama-4-maverick-17b-128e-instruct".into(),
            temperature: 0.3,
            api_key_env: "LLM_API_KEY".into(),
        }
    }
}

/// Embedding gateway settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model: String,
    /// Environment variable holding the API key; `LLM_API_KEY` is tried when unset
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: "https://integrate.api.nvidia.com/v1/embeddings".into(),
            model: "nvidia/llama-3.2-nemoretriever-300m-embed-v2".into(),
            api_key_env: "EMBED_API_KEY".into(),
        }
    }
}

/// Vector store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub collection: String,
    /// Dimensionality of both named vector spaces
    pub vector_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".into(),
            collection: "feedback_embeddings".into(),
            vector_size: 2048,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_tokens: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { max_tokens: 9000 }
    }
}

/// Two-stage semantic analysis budgets
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Completion budget for the schema-design stage
    pub schema_max_tokens: u32,
    /// Completion budget for the schema-fill stage
    pub fill_max_tokens: u32,
    /// Character budget for the concatenated source texts sent to the fill stage
    pub text_budget_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            schema_max_tokens: 90_000,
            fill_max_tokens: 100_000,
            text_budget_chars: 50_000,
        }
    }
}

/// Adaptive relevance threshold for semantic text filtering
///
/// These values were tuned empirically on one corpus and one embedding model.
/// They are not expected to carry over to other corpora unchanged.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Number of candidates requested from the similarity search
    pub breadth: usize,
    /// Strict cutoff as a fraction of the top score
    ///
    /// At 0.80, a candidate survives when it scores at least 80% of the best hit.
    pub strict_ratio: f32,
    /// Factor applied once to the strict cutoff when too few candidates survive
    ///
    /// At 0.90 the relaxed cutoff is 72% of the top score.
    pub relax_factor: f32,
    /// Survivor count below which the cutoff is relaxed
    pub min_strict_matches: usize,
    /// Minimum number of rows returned whenever that many candidates exist
    pub floor: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            breadth: 1500,
            strict_ratio: 0.80,
            relax_factor: 0.90,
            min_strict_matches: 5,
            floor: 20,
        }
    }
}

/// Named-service resolution over the service-label vector space
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceResolutionConfig {
    /// Maximum number of distinct labels accepted
    pub top_k: usize,
    /// Hits scoring below this are ignored; unset accepts every hit
    pub min_score: Option<f32>,
}

impl Default for ServiceResolutionConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_score: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Row limit for `fetch_all_feedbacks` when the plan gives none
    pub default_limit: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10_000,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| QueryError::Config(e.to_string()))?;
        config.validate().map_err(QueryError::Config)?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        let r = &self.relevance;
        if !(r.strict_ratio > 0.0 && r.strict_ratio <= 1.0) {
            return Err(format!(
                "relevance.strict_ratio ({}) must be in (0, 1]",
                r.strict_ratio
            ));
        }
        if !(r.relax_factor > 0.0 && r.relax_factor <= 1.0) {
            return Err(format!(
                "relevance.relax_factor ({}) must be in (0, 1]",
                r.relax_factor
            ));
        }
        if r.floor > r.breadth {
            return Err(format!(
                "relevance.floor ({}) should be <= relevance.breadth ({})",
                r.floor, r.breadth
            ));
        }
        if self.service_resolution.top_k == 0 {
            return Err("service_resolution.top_k must be positive".into());
        }
        if self.analysis.text_budget_chars == 0 {
            return Err("analysis.text_budget_chars must be positive".into());
        }
        if self.store.vector_size == 0 {
            return Err("store.vector_size must be positive".into());
        }
        Ok(())
    }
}
