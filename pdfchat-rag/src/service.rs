//! The entry points a front end drives: ingest a staging directory, then ask.
//!
//! [`ChatService`] owns at most one active [`ConversationSession`] together
//! with the index it reads from. A successful ingestion builds a new index,
//! starts a fresh session on it and only then tears the previous index down.
//! A failed ingestion leaves the previous session untouched.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::{BackendConfig, IndexKind, ProviderKind, RagConfig};
use crate::conversation::{AskResponse, ConversationOptions, ConversationSession};
use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerativeModel;
use crate::inmemory::InMemoryVectorIndex;
use crate::pipeline::{IngestPipeline, IngestReport};
use crate::retriever::VectorRetriever;
use crate::vectorstore::{IndexHandle, VectorIndex};

struct ActiveSession {
    session: Arc<ConversationSession>,
    handle: IndexHandle,
}

/// Ingestion and question answering over the most recently ingested batch.
pub struct ChatService {
    pipeline: IngestPipeline,
    model: Arc<dyn GenerativeModel>,
    options: ConversationOptions,
    active: RwLock<Option<ActiveSession>>,
    ingest_lock: Mutex<()>,
}

impl ChatService {
    /// Create a service from a built pipeline and a generative model.
    pub fn new(pipeline: IngestPipeline, model: Arc<dyn GenerativeModel>) -> Self {
        let options = ConversationOptions::from(pipeline.config());
        Self { pipeline, model, options, active: RwLock::new(None), ingest_lock: Mutex::new(()) }
    }

    /// Wire up the adapters selected by `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `config` is invalid or a selected
    /// backend was not compiled in.
    pub fn from_config(config: RagConfig, backend: &BackendConfig) -> Result<Self> {
        let pipeline = IngestPipeline::builder()
            .config(config)
            .embedding_provider(embedding_provider(backend)?)
            .vector_index(vector_index(backend)?)
            .build()?;
        Ok(Self::new(pipeline, generative_model(backend)?))
    }

    /// The ingestion pipeline.
    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Ingest every PDF under `dir` and start a new session over it.
    ///
    /// # Errors
    ///
    /// Any ingestion error; the previous session stays active in that case.
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestReport> {
        let _ingesting = self.ingest_lock.lock().await;
        let report = self.pipeline.ingest_directory(dir).await?;
        self.activate(report).await
    }

    /// Ingest already-loaded documents and start a new session over them.
    ///
    /// # Errors
    ///
    /// Any ingestion error; the previous session stays active in that case.
    pub async fn ingest_documents(&self, documents: &[Document]) -> Result<IngestReport> {
        let _ingesting = self.ingest_lock.lock().await;
        let report = self.pipeline.ingest_documents(documents).await?;
        self.activate(report).await
    }

    /// Ask the active session a question.
    ///
    /// # Errors
    ///
    /// [`RagError::NoActiveSession`] before the first successful ingestion,
    /// otherwise the errors of [`ConversationSession::ask`].
    pub async fn ask(&self, question: &str) -> Result<AskResponse> {
        let session = self.session().await.ok_or(RagError::NoActiveSession)?;
        session.ask(question).await
    }

    /// The active session, if any.
    pub async fn session(&self) -> Option<Arc<ConversationSession>> {
        self.active.read().await.as_ref().map(|active| Arc::clone(&active.session))
    }

    /// The handle of the index the active session reads from.
    pub async fn active_handle(&self) -> Option<IndexHandle> {
        self.active.read().await.as_ref().map(|active| active.handle.clone())
    }

    /// Replace the active session with a fresh one over the same index.
    ///
    /// This is how a front end recovers from a failed session without
    /// re-ingesting.
    ///
    /// # Errors
    ///
    /// [`RagError::NoActiveSession`] if nothing has been ingested.
    pub async fn reset_session(&self) -> Result<Arc<ConversationSession>> {
        let mut active = self.active.write().await;
        let current = active.as_mut().ok_or(RagError::NoActiveSession)?;
        let retriever = self.pipeline.retriever(&current.handle)?;
        let session = self.new_session(retriever);
        info!(session.id = %session.id(), previous = %current.session.id(), "session reset");
        current.session = Arc::clone(&session);
        Ok(session)
    }

    /// Drop the active session and tear down its index.
    ///
    /// # Errors
    ///
    /// Returns the index backend's teardown error.
    pub async fn close(&self) -> Result<()> {
        let previous = self.active.write().await.take();
        match previous {
            Some(previous) => self.pipeline.vector_index().teardown(&previous.handle).await,
            None => Ok(()),
        }
    }

    async fn activate(&self, report: IngestReport) -> Result<IngestReport> {
        let retriever = match self.pipeline.retriever(&report.handle) {
            Ok(retriever) => retriever,
            Err(e) => {
                self.teardown_quietly(&report.handle).await;
                return Err(e);
            }
        };
        let session = self.new_session(retriever);
        info!(
            session.id = %session.id(),
            collection = %report.handle.namespace,
            "started conversation session"
        );

        let previous = self
            .active
            .write()
            .await
            .replace(ActiveSession { session, handle: report.handle.clone() });
        if let Some(previous) = previous {
            // Asks still running on the old session fail with an index query error.
            self.teardown_quietly(&previous.handle).await;
        }
        Ok(report)
    }

    fn new_session(&self, retriever: VectorRetriever) -> Arc<ConversationSession> {
        let model = Arc::clone(&self.model);
        Arc::new(ConversationSession::new(Arc::new(retriever), model, self.options))
    }

    async fn teardown_quietly(&self, handle: &IndexHandle) {
        if let Err(e) = self.pipeline.vector_index().teardown(handle).await {
            warn!(collection = %handle.namespace, error = %e, "failed to tear down index");
        }
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("options", &self.options)
            .field("model", &self.model.name())
            .finish_non_exhaustive()
    }
}

#[cfg(not(all(feature = "ollama", feature = "openai", feature = "qdrant")))]
fn missing_feature(feature: &str) -> RagError {
    RagError::Config(format!("pdfchat-rag was built without the '{feature}' feature"))
}

fn embedding_provider(backend: &BackendConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match backend.embedding_provider {
        ProviderKind::Ollama => ollama_embedder(backend),
        ProviderKind::OpenAi => openai_embedder(backend),
    }
}

fn generative_model(backend: &BackendConfig) -> Result<Arc<dyn GenerativeModel>> {
    match backend.chat_provider {
        ProviderKind::Ollama => ollama_chat(backend),
        ProviderKind::OpenAi => openai_chat(backend),
    }
}

fn vector_index(backend: &BackendConfig) -> Result<Arc<dyn VectorIndex>> {
    match backend.vector_index {
        IndexKind::Memory => Ok(Arc::new(InMemoryVectorIndex::new())),
        IndexKind::Qdrant => qdrant_index(backend),
    }
}

#[cfg(feature = "ollama")]
fn ollama_embedder(backend: &BackendConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let timeout = backend.request_timeout();
    let provider = crate::ollama::OllamaEmbeddingProvider::new(&backend.embedding_url, timeout)?
        .with_model(&backend.embedding_model, backend.embedding_dimensions);
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "ollama"))]
fn ollama_embedder(_backend: &BackendConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(missing_feature("ollama"))
}

#[cfg(feature = "ollama")]
fn ollama_chat(backend: &BackendConfig) -> Result<Arc<dyn GenerativeModel>> {
    let mut model = crate::ollama::OllamaChatModel::new(
        &backend.chat_url,
        &backend.chat_model,
        backend.request_timeout(),
    )?;
    if let Some(temperature) = backend.temperature {
        model = model.with_temperature(temperature);
    }
    Ok(Arc::new(model))
}

#[cfg(not(feature = "ollama"))]
fn ollama_chat(_backend: &BackendConfig) -> Result<Arc<dyn GenerativeModel>> {
    Err(missing_feature("ollama"))
}

#[cfg(feature = "openai")]
fn openai_embedder(backend: &BackendConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let api_key = backend.api_key.clone().unwrap_or_default();
    let provider = crate::openai::OpenAIEmbeddingProvider::new(api_key, backend.request_timeout())?
        .with_base_url(&backend.embedding_url)
        .with_model(&backend.embedding_model, backend.embedding_dimensions);
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "openai"))]
fn openai_embedder(_backend: &BackendConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(missing_feature("openai"))
}

#[cfg(feature = "openai")]
fn openai_chat(backend: &BackendConfig) -> Result<Arc<dyn GenerativeModel>> {
    let mut model = crate::openai::OpenAIChatModel::new(
        backend.api_key.clone().unwrap_or_default(),
        &backend.chat_model,
        backend.request_timeout(),
    )?
    .with_base_url(&backend.chat_url);
    if let Some(temperature) = backend.temperature {
        model = model.with_temperature(temperature);
    }
    Ok(Arc::new(model))
}

#[cfg(not(feature = "openai"))]
fn openai_chat(_backend: &BackendConfig) -> Result<Arc<dyn GenerativeModel>> {
    Err(missing_feature("openai"))
}

#[cfg(feature = "qdrant")]
fn qdrant_index(backend: &BackendConfig) -> Result<Arc<dyn VectorIndex>> {
    let index =
        crate::qdrant::QdrantVectorIndex::new(&backend.qdrant_url, backend.request_timeout())?;
    Ok(Arc::new(index))
}

#[cfg(not(feature = "qdrant"))]
fn qdrant_index(_backend: &BackendConfig) -> Result<Arc<dyn VectorIndex>> {
    Err(missing_feature("qdrant"))
}
