//! Data types for documents, chunks, indexed records and search results.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A fixed-length vector representation of a passage or a query.
pub type Embedding = Vec<f32>;

/// A normalized text unit read from a source file.
///
/// Multi-page sources yield one `Document` per page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document, `{source}#{page}` for paged sources.
    pub id: String,
    /// Path or name of the originating file.
    pub source: String,
    /// 0-based page index within the source, if the source is paged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// The extracted text.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document that is not part of a paged source.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        let source = source.into();
        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), source.clone());
        Self { id: source.clone(), source, page: None, text: text.into(), metadata }
    }

    /// Create a document for a single page of a paged source.
    pub fn page(source: impl Into<String>, page: u32, text: impl Into<String>) -> Self {
        let source = source.into();
        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), source.clone());
        metadata.insert("page".to_string(), page.to_string());
        Self {
            id: format!("{source}#{page}"),
            source,
            page: Some(page),
            text: text.into(),
            metadata,
        }
    }
}

/// A bounded substring of a [`Document`], the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Identifier of the chunk, `{document_id}_{chunk_index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Path or name of the originating file.
    pub source: String,
    /// Page of the parent document, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Character offset of the first character within the parent document.
    pub start: usize,
    /// Character offset one past the last character within the parent document.
    pub end: usize,
    /// Metadata inherited from the parent document plus `chunk_index`.
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// The character range this chunk covers in its parent document.
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A chunk stored in a vector index together with its embedding.
///
/// Records are created once when an index is built and never modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedRecord {
    /// Record identifier generated at build time.
    pub id: String,
    /// The indexed chunk.
    pub chunk: Chunk,
    /// The chunk's embedding.
    pub embedding: Embedding,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
