//! Deterministic test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pdfchat_rag::{
    ChatMessage, Chunk, Chunker, Document, Embedding, EmbeddingProvider, GenerativeModel,
    InMemoryVectorIndex, IngestPipeline, RagConfig, RagError, Result, Retriever,
};
use tokio::sync::Notify;

pub const PARIS: &str = "Paris is the capital of France.";

/// Maps a handful of known words onto axes of a 3-dimensional space.
pub struct KeywordEmbedder;

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

/// Claims three dimensions but returns two.
pub struct WrongDimensionEmbedder;

#[async_trait]
impl EmbeddingProvider for WrongDimensionEmbedder {
    fn name(&self) -> &str {
        "wrong-dimension"
    }

    async fn embed(&self, _text: &str) -> Result<Embedding> {
        Ok(vec![1.0, 0.0])
    }

    fn dimensions(&self) -> usize {
        3
    }
}

/// Replies with scripted answers in order, then with `"Paris."`, and
/// records every request.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new<I: IntoIterator<Item = &'static str>>(replies: I) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok(self.replies.lock().unwrap().pop_front().unwrap_or_else(|| "Paris.".to_string()))
    }
}

/// Blocks inside `complete` until released.
#[derive(Default)]
pub struct GatedModel {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl GenerativeModel for GatedModel {
    fn name(&self) -> &str {
        "gated"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        self.started.notify_one();
        self.release.notified().await;
        Ok("Paris.".to_string())
    }
}

/// Always fails, as an unreachable model server would.
pub struct FailingModel;

#[async_trait]
impl GenerativeModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(RagError::Generation {
            model: "failing".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

/// Answers `"Paris."` for the first `successes` calls, then fails.
pub struct FailAfterModel {
    successes: usize,
    calls: AtomicUsize,
}

impl FailAfterModel {
    pub fn new(successes: usize) -> Self {
        Self { successes, calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeModel for FailAfterModel {
    fn name(&self) -> &str {
        "fail-after"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.successes {
            Ok("Paris.".to_string())
        } else {
            Err(RagError::Generation {
                model: "fail-after".to_string(),
                message: "model unloaded".to_string(),
            })
        }
    }
}

/// Returns fixed passages and records the queries it was asked.
pub struct RecordingRetriever {
    passages: Vec<Chunk>,
    pub queries: Mutex<Vec<String>>,
}

impl RecordingRetriever {
    pub fn new(passages: Vec<Chunk>) -> Self {
        Self { passages, queries: Mutex::new(Vec::new()) }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for RecordingRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.passages.iter().take(k).cloned().collect())
    }
}

pub fn paris_document() -> Document {
    Document::page("france.pdf", 0, PARIS)
}

pub fn paris_chunk() -> Chunk {
    pdfchat_rag::RecursiveChunker::new(800, 80)
        .unwrap()
        .chunk_all(&[paris_document()])
        .remove(0)
}

/// A pipeline over the keyword embedder and a fresh in-memory index.
pub fn keyword_pipeline() -> (IngestPipeline, Arc<InMemoryVectorIndex>) {
    let index = Arc::new(InMemoryVectorIndex::new());
    let pipeline = IngestPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(KeywordEmbedder))
        .vector_index(index.clone())
        .build()
        .unwrap();
    (pipeline, index)
}
