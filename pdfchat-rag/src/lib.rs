//! Conversational question answering over a folder of PDF documents.
//!
//! This crate provides:
//! - PDF loading (one [`Document`] per page) and recursive character chunking
//! - Embedding, vector index and generative model traits with adapters
//! - A [`ConversationSession`] that answers questions from retrieved passages
//! - The [`ChatService`] facade a front end drives: ingest, then ask
//!
//! # Feature flags
//!
//! | Feature | Adapters |
//! |---------|----------|
//! | `ollama` (default) | [`ollama::OllamaEmbeddingProvider`], [`ollama::OllamaChatModel`] |
//! | `openai` | [`openai::OpenAIEmbeddingProvider`], [`openai::OpenAIChatModel`] |
//! | `qdrant` | [`qdrant::QdrantVectorIndex`] |
//!
//! The [`InMemoryVectorIndex`] is always available.

pub mod chunking;
pub mod config;
pub mod conversation;
pub mod dialogue;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod loader;
pub mod pipeline;
pub mod retriever;
pub mod service;
pub mod vectorstore;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{Chunker, DEFAULT_SEPARATORS, RecursiveChunker};
pub use config::{BackendConfig, IndexKind, ProviderKind, QueryPolicy, RagConfig, RagConfigBuilder};
pub use conversation::{AskResponse, ConversationOptions, ConversationSession, SessionState};
pub use dialogue::{DialogueHistory, DialogueTurn, Role};
pub use document::{Chunk, Document, Embedding, IndexedRecord, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{ConversationStage, RagError, Result};
pub use generation::{ChatMessage, GenerationRequest, GenerativeModel, MessageRole};
pub use inmemory::InMemoryVectorIndex;
pub use loader::{DocumentLoader, PdfDirectoryLoader, discover_pdf_files};
pub use pipeline::{IngestPipeline, IngestPipelineBuilder, IngestReport};
pub use retriever::{Retriever, VectorRetriever};
pub use service::ChatService;
pub use vectorstore::{IndexHandle, VectorIndex};
