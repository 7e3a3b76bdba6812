//! Error types for the `pdfchat-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// A source file or staging directory could not be read or parsed.
    ///
    /// Aborts the whole ingestion batch.
    #[error("Load error ({path}): {message}")]
    Load {
        /// The path that failed to load.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding backend was unreachable or returned a malformed vector.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Building a vector index failed. No handle is returned.
    #[error("Index build error ({backend}): {message}")]
    IndexBuild {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Querying a vector index failed, or the handle was torn down.
    #[error("Index query error ({backend}): {message}")]
    IndexQuery {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The generative model call failed.
    #[error("Generation error ({model}): {message}")]
    Generation {
        /// The model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// A failure raised while a conversation session was answering a question.
    #[error("Conversation error during {stage}: {source}")]
    Conversation {
        /// The step of `ask` that failed.
        stage: ConversationStage,
        /// The underlying cause.
        #[source]
        source: Box<RagError>,
    },

    /// `ask` was called while another `ask` on the same session was in flight.
    #[error("Session busy: another question is still being answered")]
    SessionBusy,

    /// The session previously failed and must be discarded.
    #[error("Session failed earlier and can no longer answer questions")]
    SessionFailed,

    /// A question was asked before any documents were ingested.
    #[error("No active session: ingest documents before asking questions")]
    NoActiveSession,

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Wrap `self` as the cause of a failed conversation step.
    pub fn in_conversation(self, stage: ConversationStage) -> Self {
        RagError::Conversation { stage, source: Box::new(self) }
    }

    /// Whether the error is (or wraps) a failure reported by an external backend.
    ///
    /// Callers use this to decide whether a retry is worthwhile.
    pub fn is_backend_failure(&self) -> bool {
        match self {
            RagError::Embedding { .. }
            | RagError::IndexBuild { .. }
            | RagError::IndexQuery { .. }
            | RagError::Generation { .. } => true,
            RagError::Conversation { source, .. } => source.is_backend_failure(),
            _ => false,
        }
    }
}

/// The step of a conversation turn at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStage {
    /// Rewriting a follow-up question into a standalone retrieval query.
    QueryFormulation,
    /// Fetching supporting passages.
    Retrieval,
    /// Calling the generative model.
    Generation,
}

impl std::fmt::Display for ConversationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConversationStage::QueryFormulation => "query_formulation",
            ConversationStage::Retrieval => "retrieval",
            ConversationStage::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
