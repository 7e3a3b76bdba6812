//! Splitting documents into overlapping, size-bounded chunks.
//!
//! [`RecursiveChunker`] splits text at the highest-priority separator that
//! keeps pieces small enough (paragraphs, then lines, then sentences, then
//! words, then single characters) and packs the pieces back into windows of at
//! most `chunk_size` characters. Every window after the first starts with the
//! last `chunk_overlap` characters of the previous one, so dropping that
//! prefix from each chunk and concatenating gives back the original text.
//!
//! Sizes and offsets are counted in characters, not bytes.

use std::ops::Range;

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split every document, keeping document order.
    fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|document| self.chunk(document)).collect()
    }
}

/// Separators tried in priority order before falling back to single characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// Recursive separator-based chunker with a fixed character overlap.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(800, 80)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with the default separators.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "invalid chunking parameters: chunk_size={chunk_size}, \
                 chunk_overlap={chunk_overlap}"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    /// Create a chunker from the `chunk_size` and `chunk_overlap` of a config.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Replace the separator priority list. Empty separators are ignored;
    /// splitting into single characters is always the last resort.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators =
            separators.into_iter().map(Into::into).filter(|s: &String| !s.is_empty()).collect();
        self
    }

    /// Maximum chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Compute chunk boundaries for `text` as character ranges.
    pub fn split_ranges(&self, text: &str) -> Vec<Range<usize>> {
        let total = text.chars().count();
        if total == 0 {
            return Vec::new();
        }
        if total <= self.chunk_size {
            return vec![0..total];
        }

        // Later windows hold `chunk_overlap` repeated characters, so a piece
        // must fit in what is left for new text.
        let step = self.chunk_size - self.chunk_overlap;
        let mut pieces = Vec::new();
        split_pieces(text, step, &self.separators, &mut pieces);
        pack_windows(&pieces, self.chunk_size, self.chunk_overlap)
    }
}

/// Split `text` into contiguous pieces of at most `max_len` characters,
/// pushing each piece's length. Concatenating the pieces gives `text`.
fn split_pieces(text: &str, max_len: usize, separators: &[String], pieces: &mut Vec<usize>) {
    let len = text.chars().count();
    if len <= max_len {
        if len > 0 {
            pieces.push(len);
        }
        return;
    }

    match separators.split_first() {
        Some((separator, rest)) => {
            for segment in split_keeping_separator(text, separator) {
                split_pieces(segment, max_len, rest, pieces);
            }
        }
        None => pieces.resize(pieces.len() + len, 1),
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Greedily pack consecutive pieces into windows of at most `chunk_size`
/// characters. A new window starts `chunk_overlap` characters before the
/// end of the previous one.
fn pack_windows(pieces: &[usize], chunk_size: usize, chunk_overlap: usize) -> Vec<Range<usize>> {
    let mut windows = Vec::new();
    let mut start = 0;
    let mut end = 0;

    for &piece in pieces {
        if end > start + chunk_overlap && end + piece - start > chunk_size {
            windows.push(start..end);
            start = end - chunk_overlap;
        }
        end += piece;
    }

    if end > start {
        windows.push(start..end);
    }
    windows
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let ranges = self.split_ranges(&document.text);
        if ranges.is_empty() {
            return Vec::new();
        }

        let byte_offsets: Vec<usize> = document
            .text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(document.text.len()))
            .collect();

        ranges
            .into_iter()
            .enumerate()
            .map(|(i, range)| {
                let text = &document.text[byte_offsets[range.start]..byte_offsets[range.end]];
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), i.to_string());
                Chunk {
                    id: format!("{}_{i}", document.id),
                    document_id: document.id.clone(),
                    text: text.to_string(),
                    source: document.source.clone(),
                    page: document.page,
                    start: range.start,
                    end: range.end,
                    metadata,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_separator_on_preceding_segment() {
        assert_eq!(split_keeping_separator("a\n\nb\n\nc", "\n\n"), vec!["a\n\n", "b\n\n", "c"]);
        assert_eq!(split_keeping_separator("no separator", "\n"), vec!["no separator"]);
    }

    #[test]
    fn short_document_is_a_single_chunk() {
        let chunker = RecursiveChunker::new(800, 80).unwrap();
        let document = Document::page("france.pdf", 0, "Paris is the capital of France.");

        let chunks = chunker.chunk(&document);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Paris is the capital of France.");
        assert_eq!(chunks[0].span(), 0..31);
        assert_eq!(chunks[0].page, Some(0));
        assert_eq!(chunks[0].metadata.get("chunk_index").map(String::as_str), Some("0"));
        assert_eq!(chunks[0].metadata.get("source").map(String::as_str), Some("france.pdf"));
    }

    #[test]
    fn empty_document_has_no_chunks() {
        let chunker = RecursiveChunker::new(10, 2).unwrap();
        assert!(chunker.chunk(&Document::new("empty.pdf", "")).is_empty());
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let chunker = RecursiveChunker::new(20, 0).unwrap();
        let text = "first paragraph.\n\nsecond paragraph";
        let chunks = chunker.chunk(&Document::new("p.pdf", text));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "first paragraph.\n\n");
        assert_eq!(chunks[1].text, "second paragraph");
    }

    #[test]
    fn custom_separators_replace_the_defaults() {
        let text = "alpha;beta;gamma";

        let by_default = RecursiveChunker::new(12, 0).unwrap().chunk(&Document::new("s.pdf", text));
        assert_eq!(by_default[0].text, "alpha;beta;g");

        let chunker = RecursiveChunker::new(12, 0).unwrap().with_separators([";", ""]);
        let chunks = chunker.chunk(&Document::new("s.pdf", text));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha;beta;", "gamma"]);
    }

    #[test]
    fn overlap_repeats_tail_of_previous_chunk() {
        let chunker = RecursiveChunker::new(12, 4).unwrap();
        let text = "one two three four five six seven";
        let chunks = chunker.chunk(&Document::new("o.pdf", text));

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let previous: Vec<char> = pair[0].text.chars().collect();
            let tail: String = previous[previous.len() - 4..].iter().collect();
            let head: String = pair[1].text.chars().take(4).collect();
            assert_eq!(tail, head);
            assert_eq!(pair[1].start, pair[0].end - 4);
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunker = RecursiveChunker::new(5, 1).unwrap();
        let text = "ééééééééé";
        let chunks = chunker.chunk(&Document::new("u.pdf", text));

        assert!(chunks.iter().all(|c| c.text.chars().count() <= 5));
        assert_eq!(chunks[0].text, "ééééé");
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(RecursiveChunker::new(10, 10).is_err());
        assert!(RecursiveChunker::new(0, 0).is_err());
    }

    #[test]
    fn chunk_all_preserves_document_order() {
        let chunker = RecursiveChunker::new(800, 80).unwrap();
        let documents =
            vec![Document::page("a.pdf", 0, "alpha"), Document::page("a.pdf", 1, "beta")];
        let chunks = chunker.chunk_all(&documents);

        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a.pdf#0_0", "a.pdf#1_0"]);
    }
}
