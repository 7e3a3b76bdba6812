//! Configuration for ingestion, retrieval and the backend adapters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// How the retrieval query is derived from a user question.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryPolicy {
    /// Use the question text as-is.
    #[default]
    Verbatim,
    /// Ask the generative model to rewrite a follow-up question into a
    /// standalone one using the dialogue history. Only applies once the
    /// history is non-empty.
    Condense,
}

impl std::str::FromStr for QueryPolicy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "verbatim" => Ok(Self::Verbatim),
            "condense" => Ok(Self::Condense),
            other => Err(RagError::Config(format!("unknown query policy '{other}'"))),
        }
    }
}

/// Tuning parameters for chunking, embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of characters repeated between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of passages retrieved per question.
    pub top_k: usize,
    /// Minimum similarity score for retrieved passages.
    pub similarity_threshold: f32,
    /// Number of passages sent to the embedding backend per request.
    pub embedding_batch_size: usize,
    /// Number of embedding requests allowed in flight during ingestion.
    pub embedding_concurrency: usize,
    /// How the retrieval query is formulated.
    pub query_policy: QueryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 80,
            top_k: 4,
            similarity_threshold: 0.0,
            embedding_batch_size: 32,
            embedding_concurrency: 4,
            query_policy: QueryPolicy::Verbatim,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embedding_batch_size == 0` or `embedding_concurrency == 0`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::Config(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.embedding_concurrency == 0 {
            return Err(RagError::Config(
                "embedding_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of passages retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for retrieved passages.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the number of passages per embedding request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the number of concurrent embedding requests during ingestion.
    pub fn embedding_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embedding_concurrency = concurrency;
        self
    }

    /// Set how the retrieval query is formulated.
    pub fn query_policy(mut self, policy: QueryPolicy) -> Self {
        self.config.query_policy = policy;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Which embedding or chat backend to talk to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// The Ollama HTTP API.
    #[default]
    Ollama,
    /// An OpenAI-compatible HTTP API.
    OpenAi,
}

impl std::str::FromStr for ProviderKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(RagError::Config(format!("unknown provider '{other}'"))),
        }
    }
}

/// Which vector index implementation stores passages.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Process-local index.
    #[default]
    Memory,
    /// A Qdrant server.
    Qdrant,
}

impl std::str::FromStr for IndexKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            other => Err(RagError::Config(format!("unknown vector index '{other}'"))),
        }
    }
}

/// Endpoints and model names for the external services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Embedding backend.
    pub embedding_provider: ProviderKind,
    /// Base URL of the embedding backend.
    pub embedding_url: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Dimension every embedding must have.
    pub embedding_dimensions: usize,
    /// Generative model backend.
    pub chat_provider: ProviderKind,
    /// Base URL of the generative model backend.
    pub chat_url: String,
    /// Generative model name.
    pub chat_model: String,
    /// Sampling temperature; the model's own default when unset.
    pub temperature: Option<f32>,
    /// Vector index backend.
    pub vector_index: IndexKind,
    /// Qdrant gRPC URL, used when `vector_index` is `qdrant`.
    pub qdrant_url: String,
    /// API key for OpenAI-compatible backends.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout applied by every adapter.
    pub request_timeout_secs: u64,
}

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Qdrant gRPC endpoint.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            embedding_provider: ProviderKind::Ollama,
            embedding_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: 768,
            chat_provider: ProviderKind::Ollama,
            chat_url: DEFAULT_OLLAMA_URL.to_string(),
            chat_model: "llama3:8b-instruct-q5_1".to_string(),
            temperature: None,
            vector_index: IndexKind::Memory,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            api_key: None,
            request_timeout_secs: 120,
        }
    }
}

impl BackendConfig {
    /// Build a configuration from defaults overridden by environment variables.
    ///
    /// Recognized variables: `OLLAMA_API_BASE_URL` (both endpoints),
    /// `PDFCHAT_EMBEDDING_MODEL`, `PDFCHAT_EMBEDDING_DIMENSIONS`,
    /// `PDFCHAT_CHAT_MODEL`, `QDRANT_URL`, `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("OLLAMA_API_BASE_URL") {
            config.embedding_url = url.clone();
            config.chat_url = url;
        }
        if let Some(model) = lookup("PDFCHAT_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(dims) = lookup("PDFCHAT_EMBEDDING_DIMENSIONS") {
            config.embedding_dimensions = dims.parse().map_err(|_| {
                RagError::Config(format!("PDFCHAT_EMBEDDING_DIMENSIONS is not a number: {dims}"))
            })?;
        }
        if let Some(model) = lookup("PDFCHAT_CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Some(url) = lookup("QDRANT_URL") {
            config.qdrant_url = url;
            config.vector_index = IndexKind::Qdrant;
        }
        config.api_key = lookup("OPENAI_API_KEY");
        Ok(config)
    }

    /// The per-request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
