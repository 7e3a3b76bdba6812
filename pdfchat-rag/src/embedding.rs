//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

use crate::document::Embedding;
use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Ollama, OpenAI, etc.)
/// behind a unified async interface. The same text must always map to the
/// same vector for a fixed backend and model, so indexing is reproducible.
/// The default [`embed_many`](EmbeddingProvider::embed_many) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short name of the backend, used in errors and logs.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embedding vectors for several inputs, in input order.
    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Check that a backend returned one finite vector per input, each of the
/// expected length.
///
/// Adapters call this on every response.
///
/// # Errors
///
/// Returns [`RagError::Embedding`] on a count or dimension mismatch, or when
/// a vector holds a NaN or infinite component.
pub fn check_embeddings(
    provider: &str,
    expected_dimensions: usize,
    expected_count: usize,
    embeddings: &[Embedding],
) -> Result<()> {
    if embeddings.len() != expected_count {
        return Err(RagError::Embedding {
            provider: provider.to_string(),
            message: format!("expected {expected_count} embeddings, got {}", embeddings.len()),
        });
    }
    if let Some((index, bad)) =
        embeddings.iter().enumerate().find(|(_, e)| e.len() != expected_dimensions)
    {
        return Err(RagError::Embedding {
            provider: provider.to_string(),
            message: format!(
                "embedding {index} has dimension {}, expected {expected_dimensions}",
                bad.len()
            ),
        });
    }
    // A NaN would compare above every real similarity score.
    if let Some(index) = embeddings.iter().position(|e| !e.iter().all(|x| x.is_finite())) {
        return Err(RagError::Embedding {
            provider: provider.to_string(),
            message: format!("embedding {index} has a non-finite component"),
        });
    }
    Ok(())
}

/// Embed `texts` in batches of `batch_size`, with up to `concurrency`
/// requests in flight, returning vectors in input order.
///
/// Every returned vector is checked against `provider.dimensions()`.
///
/// # Errors
///
/// Returns the first error reported by any batch, or [`RagError::Embedding`]
/// if a batch comes back with the wrong shape.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
    batch_size: usize,
    concurrency: usize,
) -> Result<Vec<Embedding>> {
    let batch_size = batch_size.max(1);
    let batches: Vec<Vec<Embedding>> = stream::iter(texts.chunks(batch_size))
        .map(|batch| async move {
            debug!(provider = provider.name(), batch_size = batch.len(), "embedding batch");
            let embeddings = provider.embed_many(batch).await?;
            check_embeddings(provider.name(), provider.dimensions(), batch.len(), &embeddings)?;
            Ok::<_, RagError>(embeddings)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(batches.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct LengthEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }

        async fn embed(&self, text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn batches_preserve_input_order() {
        let provider = LengthEmbedder { calls: AtomicUsize::new(0) };
        let texts = ["a", "bb", "ccc", "dddd", "eeeee"];

        let embeddings = embed_in_batches(&provider, &texts, 2, 3).await.unwrap();

        let firsts: Vec<f32> = embeddings.iter().map(|e| e[0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn dimension_mismatch_is_an_embedding_error() {
        let err = check_embeddings("test", 3, 1, &[vec![0.0, 1.0]]).unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }));
        assert!(err.to_string().contains("dimension 2, expected 3"));
    }

    #[test]
    fn non_finite_components_are_an_embedding_error() {
        let err = check_embeddings("test", 2, 2, &[vec![1.0, 0.0], vec![f32::NAN, 0.0]])
            .unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }));
        assert!(err.to_string().contains("embedding 1 has a non-finite component"));

        assert!(check_embeddings("test", 2, 1, &[vec![f32::INFINITY, 0.0]]).is_err());
        assert!(check_embeddings("test", 2, 1, &[vec![f32::NEG_INFINITY, 0.0]]).is_err());
    }

    #[tokio::test]
    async fn batch_with_a_nan_vector_is_rejected() {
        struct NanEmbedder;

        #[async_trait]
        impl EmbeddingProvider for NanEmbedder {
            fn name(&self) -> &str {
                "nan"
            }

            async fn embed(&self, text: &str) -> Result<Embedding> {
                Ok(if text == "bad" { vec![f32::NAN, 0.0] } else { vec![1.0, 0.0] })
            }

            fn dimensions(&self) -> usize {
                2
            }
        }

        let err = embed_in_batches(&NanEmbedder, &["good", "bad"], 8, 1).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }));
    }

    #[test]
    fn count_mismatch_is_an_embedding_error() {
        assert!(check_embeddings("test", 2, 2, &[vec![0.0, 1.0]]).is_err());
        assert!(check_embeddings("test", 2, 1, &[vec![0.0, 1.0]]).is_ok());
    }
}
