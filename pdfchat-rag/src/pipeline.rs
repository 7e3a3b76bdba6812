//! Ingestion pipeline: load → chunk → embed → build index.
//!
//! The [`IngestPipeline`] composes a [`DocumentLoader`], a [`Chunker`], an
//! [`EmbeddingProvider`] and a [`VectorIndex`]. Each ingestion builds a new
//! index; it never merges into an existing one.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfchat_rag::{IngestPipeline, InMemoryVectorIndex, RagConfig};
//!
//! let pipeline = IngestPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .build()?;
//!
//! let report = pipeline.ingest_directory(Path::new("uploads/20240101_120000")).await?;
//! let retriever = pipeline.retriever(&report.handle)?;
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::Document;
use crate::embedding::{EmbeddingProvider, embed_in_batches};
use crate::error::{RagError, Result};
use crate::loader::{DocumentLoader, PdfDirectoryLoader};
use crate::retriever::VectorRetriever;
use crate::vectorstore::{IndexHandle, VectorIndex};

/// Summary of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Handle of the newly built index.
    pub handle: IndexHandle,
    /// Number of documents (pages) loaded.
    pub document_count: usize,
    /// Number of chunks embedded and indexed.
    pub chunk_count: usize,
}

/// Builds a fresh vector index from a batch of documents.
///
/// Construct one via [`IngestPipeline::builder()`].
pub struct IngestPipeline {
    config: RagConfig,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
}

impl IngestPipeline {
    /// Create a new [`IngestPipelineBuilder`].
    pub fn builder() -> IngestPipelineBuilder {
        IngestPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector index.
    pub fn vector_index(&self) -> &Arc<dyn VectorIndex> {
        &self.vector_index
    }

    /// Load every document under `dir` and index it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Load`] if the directory or any file cannot be
    /// read, and otherwise the errors of [`ingest_documents`](Self::ingest_documents).
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestReport> {
        let loader = Arc::clone(&self.loader);
        let path = dir.to_path_buf();
        let documents = tokio::task::spawn_blocking(move || loader.load(&path))
            .await
            .map_err(|e| RagError::Load {
                path: dir.display().to_string(),
                message: format!("loader task failed: {e}"),
            })?
            .inspect_err(|e| error!(directory = %dir.display(), error = %e, "loading failed"))?;

        self.ingest_documents(&documents).await
    }

    /// Chunk, embed and index `documents` into a new index.
    ///
    /// Nothing is queryable unless every step succeeds.
    ///
    /// # Errors
    ///
    /// - [`RagError::Load`] if there are no documents with text.
    /// - [`RagError::Embedding`] if the embedding backend fails or returns
    ///   vectors of the wrong dimension.
    /// - [`RagError::IndexBuild`] if the index cannot be built.
    pub async fn ingest_documents(&self, documents: &[Document]) -> Result<IngestReport> {
        // 1. Chunk the documents
        let chunks = self.chunker.chunk_all(documents);
        if chunks.is_empty() {
            return Err(RagError::Load {
                path: "<batch>".to_string(),
                message: "no documents with extractable text".to_string(),
            });
        }

        // 2. Generate embeddings, batched, in chunk order
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embed_in_batches(
            self.embedding_provider.as_ref(),
            &texts,
            self.config.embedding_batch_size,
            self.config.embedding_concurrency,
        )
        .await
        .inspect_err(|e| error!(error = %e, "embedding failed during ingestion"))?;

        // 3. Build the index in one shot
        let chunk_count = chunks.len();
        let records = chunks.into_iter().zip(embeddings).collect();
        let handle = self
            .vector_index
            .build(records)
            .await
            .inspect_err(|e| error!(error = %e, "index build failed during ingestion"))?;

        info!(
            collection = %handle.namespace,
            document_count = documents.len(),
            chunk_count,
            dimensions = handle.dimensions,
            "ingested documents"
        );

        Ok(IngestReport { handle, document_count: documents.len(), chunk_count })
    }

    /// A retriever over the index identified by `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the embedder's dimension does not
    /// match the index.
    pub fn retriever(&self, handle: &IndexHandle) -> Result<VectorRetriever> {
        let retriever = VectorRetriever::new(
            Arc::clone(&self.embedding_provider),
            Arc::clone(&self.vector_index),
            handle.clone(),
        )?;
        Ok(if self.config.similarity_threshold > 0.0 {
            retriever.with_score_threshold(self.config.similarity_threshold)
        } else {
            retriever
        })
    }
}

/// Builder for constructing an [`IngestPipeline`].
///
/// The embedding provider and vector index are required. The loader defaults
/// to [`PdfDirectoryLoader`] and the chunker to a [`RecursiveChunker`] built
/// from the config.
#[derive(Default)]
pub struct IngestPipelineBuilder {
    config: Option<RagConfig>,
    loader: Option<Arc<dyn DocumentLoader>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
}

impl IngestPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document loader.
    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Build the [`IngestPipeline`], validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required component is missing or
    /// the configuration is invalid.
    pub fn build(self) -> Result<IngestPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::Config("vector_index is required".to_string()))?;
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::from_config(&config)?),
        };
        let loader: Arc<dyn DocumentLoader> = match self.loader {
            Some(loader) => loader,
            None => Arc::new(PdfDirectoryLoader::new()),
        };

        Ok(IngestPipeline { config, loader, chunker, embedding_provider, vector_index })
    }
}
