//! In-memory vector index using cosine similarity.
//!
//! [`InMemoryVectorIndex`] keeps one record list per namespace behind a
//! `tokio::sync::RwLock`. It needs no external service and is the default
//! index for a single-process session.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Chunk, Embedding, IndexedRecord, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{
    IndexHandle, VectorIndex, cosine_similarity, validate_query, validate_records,
};

const BACKEND: &str = "InMemory";

/// An in-memory vector index using cosine similarity for search.
///
/// Namespaces are stored as `namespace → records` in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    namespaces: RwLock<HashMap<String, Vec<IndexedRecord>>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory vector index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live namespaces.
    pub async fn namespace_count(&self) -> usize {
        self.namespaces.read().await.len()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn build(&self, records: Vec<(Chunk, Embedding)>) -> Result<IndexHandle> {
        let dimensions = validate_records(BACKEND, &records)?;
        let handle = IndexHandle::fresh(dimensions, records.len());

        let records: Vec<IndexedRecord> = records
            .into_iter()
            .map(|(chunk, embedding)| IndexedRecord {
                id: uuid::Uuid::new_v4().to_string(),
                chunk,
                embedding,
            })
            .collect();

        // Records become visible in a single insert.
        self.namespaces.write().await.insert(handle.namespace.clone(), records);
        debug!(collection = %handle.namespace, record_count = handle.record_count, "built index");
        Ok(handle)
    }

    async fn search(
        &self,
        handle: &IndexHandle,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        validate_query(BACKEND, handle, query, k)?;

        let namespaces = self.namespaces.read().await;
        let records = namespaces.get(&handle.namespace).ok_or_else(|| RagError::IndexQuery {
            backend: BACKEND.to_string(),
            message: format!("index '{}' has been torn down", handle.namespace),
        })?;

        let mut scored: Vec<SearchResult> = records
            .iter()
            .map(|record| SearchResult {
                chunk: record.chunk.clone(),
                score: cosine_similarity(&record.embedding, query),
            })
            .collect();

        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn teardown(&self, handle: &IndexHandle) -> Result<()> {
        let removed = self.namespaces.write().await.remove(&handle.namespace);
        debug!(collection = %handle.namespace, existed = removed.is_some(), "tore down index");
        Ok(())
    }
}
