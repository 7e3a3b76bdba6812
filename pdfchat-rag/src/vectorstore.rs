//! Vector index trait for storing passage embeddings and searching them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, Embedding, SearchResult};
use crate::error::{RagError, Result};

/// Identifies one built index.
///
/// Every [`VectorIndex::build`] creates a fresh storage namespace, so two
/// handles never share storage. A handle becomes stale once
/// [`VectorIndex::teardown`] has been called for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHandle {
    /// Storage namespace (collection name) owned by this index.
    pub namespace: String,
    /// Dimension of every stored embedding.
    pub dimensions: usize,
    /// Number of records committed by the build.
    pub record_count: usize,
}

impl IndexHandle {
    /// Generate a handle for a new, unique namespace.
    pub fn fresh(dimensions: usize, record_count: usize) -> Self {
        Self {
            namespace: format!("pdfchat_{}", uuid::Uuid::new_v4().simple()),
            dimensions,
            record_count,
        }
    }
}

/// A storage backend for passage embeddings with similarity search.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// let handle = index.build(records).await?;
/// let results = index.search(&handle, &query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short name of the backend, used in errors and logs.
    fn backend(&self) -> &str;

    /// Create a fresh index holding all `records`.
    ///
    /// Either every record is committed and a handle is returned, or the
    /// build fails and nothing built so far stays queryable.
    async fn build(&self, records: Vec<(Chunk, Embedding)>) -> Result<IndexHandle>;

    /// Return up to `k` records nearest to `query`, most similar first.
    ///
    /// Equal scores keep insertion order.
    async fn search(
        &self,
        handle: &IndexHandle,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Delete the storage behind `handle`. Later searches on it fail with
    /// [`RagError::IndexQuery`].
    ///
    /// A backend that cannot delete the storage reports
    /// [`RagError::IndexBuild`], since the failure belongs to the index
    /// lifecycle rather than to a query.
    async fn teardown(&self, handle: &IndexHandle) -> Result<()>;
}

/// Check that a batch of records is non-empty and has a single, non-zero
/// embedding dimension with finite components, returning that dimension.
///
/// # Errors
///
/// Returns [`RagError::IndexBuild`] otherwise.
pub fn validate_records(backend: &str, records: &[(Chunk, Embedding)]) -> Result<usize> {
    let Some((_, first)) = records.first() else {
        return Err(RagError::IndexBuild {
            backend: backend.to_string(),
            message: "cannot build an index without records".to_string(),
        });
    };
    let dimensions = first.len();
    if dimensions == 0 {
        return Err(RagError::IndexBuild {
            backend: backend.to_string(),
            message: "embeddings must not be empty".to_string(),
        });
    }
    if let Some((chunk, embedding)) = records.iter().find(|(_, e)| e.len() != dimensions) {
        return Err(RagError::IndexBuild {
            backend: backend.to_string(),
            message: format!(
                "chunk '{}' has dimension {}, expected {dimensions}",
                chunk.id,
                embedding.len()
            ),
        });
    }
    if let Some((chunk, _)) = records.iter().find(|(_, e)| !e.iter().all(|x| x.is_finite())) {
        return Err(RagError::IndexBuild {
            backend: backend.to_string(),
            message: format!("chunk '{}' has a non-finite embedding", chunk.id),
        });
    }
    Ok(dimensions)
}

/// Check the arguments of a search against the handle.
///
/// # Errors
///
/// Returns [`RagError::IndexQuery`] if `k` is zero or the query dimension
/// differs from the index dimension.
pub fn validate_query(backend: &str, handle: &IndexHandle, query: &[f32], k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::IndexQuery {
            backend: backend.to_string(),
            message: "k must be at least 1".to_string(),
        });
    }
    if query.len() != handle.dimensions {
        return Err(RagError::IndexQuery {
            backend: backend.to_string(),
            message: format!(
                "query has dimension {}, index '{}' expects {}",
                query.len(),
                handle.namespace,
                handle.dimensions
            ),
        });
    }
    Ok(())
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
