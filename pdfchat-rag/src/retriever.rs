//! Similarity-search contract used by the conversation engine.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::document::Chunk;
use crate::embedding::{EmbeddingProvider, check_embeddings};
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexHandle, VectorIndex};

/// Fetches the passages most relevant to a query, best first.
///
/// Any implementation can stand in for the vector-backed one, which keeps
/// the conversation engine independent of the concrete index and embedder.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` chunks ranked by relevance to `query`.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>>;
}

/// A [`Retriever`] that embeds the query and searches one built index.
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    handle: IndexHandle,
    score_threshold: Option<f32>,
}

impl VectorRetriever {
    /// Bind a retriever to the index identified by `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the embedder's dimension differs from
    /// the dimension the index was built with.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        handle: IndexHandle,
    ) -> Result<Self> {
        if embedder.dimensions() != handle.dimensions {
            return Err(RagError::Config(format!(
                "embedder '{}' produces {} dimensions but index '{}' holds {}",
                embedder.name(),
                embedder.dimensions(),
                handle.namespace,
                handle.dimensions
            )));
        }
        Ok(Self { embedder, index, handle, score_threshold: None })
    }

    /// Drop results scoring below `threshold`.
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    /// The handle of the index this retriever searches.
    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        let query_embedding = self.embedder.embed(query).await.inspect_err(|e| {
            error!(error = %e, "query embedding failed");
        })?;
        check_embeddings(
            self.embedder.name(),
            self.handle.dimensions,
            1,
            std::slice::from_ref(&query_embedding),
        )?;

        let results =
            self.index.search(&self.handle, &query_embedding, k).await.inspect_err(|e| {
                error!(collection = %self.handle.namespace, error = %e, "vector search failed");
            })?;

        let threshold = self.score_threshold.unwrap_or(f32::NEG_INFINITY);
        let chunks: Vec<Chunk> =
            results.into_iter().filter(|r| r.score >= threshold).map(|r| r.chunk).collect();

        debug!(
            collection = %self.handle.namespace,
            result_count = chunks.len(),
            "retrieved chunks"
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Embedding;
    use crate::inmemory::InMemoryVectorIndex;

    /// Maps a handful of known words onto axes.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn embed(&self, text: &str) -> Result<Embedding> {
            let text = text.to_lowercase();
            Ok(vec![
                if text.contains("paris") || text.contains("france") { 1.0 } else { 0.0 },
                if text.contains("rust") { 1.0 } else { 0.0 },
                0.1,
            ])
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: id.to_string(),
            text: text.to_string(),
            source: format!("{id}.pdf"),
            page: Some(0),
            start: 0,
            end: text.chars().count(),
            metadata: HashMap::new(),
        }
    }

    async fn build() -> (Arc<dyn EmbeddingProvider>, Arc<dyn VectorIndex>, IndexHandle) {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(KeywordEmbedder);
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new());
        let mut records = Vec::new();
        for c in [chunk("geo", "Paris is the capital of France."), chunk("lang", "Rust is fast.")]
        {
            let embedding = embedder.embed(&c.text).await.unwrap();
            records.push((c, embedding));
        }
        let handle = index.build(records).await.unwrap();
        (embedder, index, handle)
    }

    #[tokio::test]
    async fn returns_chunks_in_ranked_order() {
        let (embedder, index, handle) = build().await;
        let retriever = VectorRetriever::new(embedder, index, handle).unwrap();

        let chunks = retriever.retrieve("What is the capital of France?", 2).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Paris is the capital of France.");
    }

    #[tokio::test]
    async fn threshold_filters_weak_matches() {
        let (embedder, index, handle) = build().await;
        let retriever =
            VectorRetriever::new(embedder, index, handle).unwrap().with_score_threshold(0.5);

        let chunks = retriever.retrieve("tell me about rust", 4).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "lang");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_a_config_error() {
        let (embedder, index, mut handle) = build().await;
        handle.dimensions = 5;
        let err = VectorRetriever::new(embedder, index, handle).err().unwrap();
        assert!(matches!(err, RagError::Config(_)));
    }
}
