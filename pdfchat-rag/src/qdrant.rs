//! Qdrant vector index backend.
//!
//! Provides [`QdrantVectorIndex`] which implements [`VectorIndex`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC. Each
//! build creates its own collection; teardown drops it.
//!
//! This module is only available when the `qdrant` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, error, warn};

use crate::document::{Chunk, Embedding, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexHandle, VectorIndex, validate_query, validate_records};

const BACKEND: &str = "qdrant";

/// Points sent per upsert request.
const UPSERT_BATCH_SIZE: usize = 256;

/// A [`VectorIndex`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantVectorIndex {
    client: Qdrant,
}

impl QdrantVectorIndex {
    /// Connect to the Qdrant server at `url` (gRPC, usually port 6334).
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("invalid Qdrant client settings: {e}")))?;
        Ok(Self { client })
    }

    fn build_err(e: impl std::fmt::Display) -> RagError {
        RagError::IndexBuild { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn teardown_err(handle: &IndexHandle, e: impl std::fmt::Display) -> RagError {
        RagError::IndexBuild {
            backend: BACKEND.to_string(),
            message: format!("failed to drop collection '{}': {e}", handle.namespace),
        }
    }

    fn query_err(e: impl std::fmt::Display) -> RagError {
        RagError::IndexQuery { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn extract_string(value: &QdrantValue) -> Option<&str> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s),
            _ => None,
        }
    }

    fn extract_integer(value: &QdrantValue) -> Option<i64> {
        match &value.kind {
            Some(Kind::IntegerValue(n)) => Some(*n),
            _ => None,
        }
    }

    fn to_point(seq: usize, chunk: &Chunk, embedding: Embedding) -> Result<PointStruct> {
        let chunk_json = serde_json::to_string(chunk).map_err(Self::build_err)?;
        let payload = Payload::try_from(serde_json::json!({
            "seq": seq,
            "text": chunk.text,
            "source": chunk.source,
            "chunk": chunk_json,
        }))
        .map_err(Self::build_err)?;
        Ok(PointStruct::new(uuid::Uuid::new_v4().to_string(), embedding, payload))
    }

    async fn upsert_all(&self, namespace: &str, records: Vec<(Chunk, Embedding)>) -> Result<()> {
        let mut points = Vec::with_capacity(records.len());
        for (seq, (chunk, embedding)) in records.into_iter().enumerate() {
            points.push(Self::to_point(seq, &chunk, embedding)?);
        }
        while !points.is_empty() {
            let rest = points.split_off(points.len().min(UPSERT_BATCH_SIZE));
            self.client
                .upsert_points(UpsertPointsBuilder::new(namespace, points).wait(true))
                .await
                .map_err(Self::build_err)?;
            points = rest;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn build(&self, records: Vec<(Chunk, Embedding)>) -> Result<IndexHandle> {
        let dimensions = validate_records(BACKEND, &records)?;
        let handle = IndexHandle::fresh(dimensions, records.len());

        self.client
            .create_collection(
                CreateCollectionBuilder::new(handle.namespace.as_str())
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::build_err)?;

        if let Err(e) = self.upsert_all(&handle.namespace, records).await {
            error!(
                collection = %handle.namespace,
                error = %e,
                "upsert failed, dropping collection"
            );
            if let Err(drop_err) = self.client.delete_collection(handle.namespace.as_str()).await {
                warn!(
                    collection = %handle.namespace,
                    error = %drop_err,
                    "failed to drop partial collection"
                );
            }
            return Err(e);
        }

        debug!(
            collection = %handle.namespace,
            record_count = handle.record_count,
            "built qdrant index"
        );
        Ok(handle)
    }

    async fn search(
        &self,
        handle: &IndexHandle,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        validate_query(BACKEND, handle, query, k)?;

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(handle.namespace.as_str(), query.to_vec(), k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(Self::query_err)?;

        let mut results = Vec::with_capacity(response.result.len());
        for scored in response.result {
            let seq = scored.payload.get("seq").and_then(Self::extract_integer).unwrap_or(i64::MAX);
            let chunk_json = scored
                .payload
                .get("chunk")
                .and_then(Self::extract_string)
                .ok_or_else(|| Self::query_err("point payload has no chunk"))?;
            let chunk: Chunk = serde_json::from_str(chunk_json).map_err(Self::query_err)?;
            results.push((seq, SearchResult { chunk, score: scored.score }));
        }

        // Qdrant does not promise an order for equal scores.
        results.sort_by(|(seq_a, a), (seq_b, b)| {
            b.score.total_cmp(&a.score).then_with(|| seq_a.cmp(seq_b))
        });
        Ok(results.into_iter().map(|(_, result)| result).collect())
    }

    async fn teardown(&self, handle: &IndexHandle) -> Result<()> {
        self.client
            .delete_collection(handle.namespace.as_str())
            .await
            .map_err(|e| Self::teardown_err(handle, e))?;
        debug!(collection = %handle.namespace, "dropped qdrant collection");
        Ok(())
    }
}
