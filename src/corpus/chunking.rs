//! Sentence-aware splitting of document text into overlapping chunks.
//!
//! Documents arrive as already-extracted plain text; how a PDF or page
//! became that text is the host's problem. Chunks are packed from whole
//! sentences up to a character budget, and consecutive chunks share a
//! tail of sentences so retrieval does not lose context at boundaries.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::store::Chunk;
use crate::core::config::AssistantConfig;

/// A document handed over for ingestion: an opaque source identifier plus
/// its extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source_id: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    pub fn from_config(config: &AssistantConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split one document into chunks with per-source positions starting
    /// at 0. Whitespace-only text produces no chunks.
    pub fn chunk_document(&self, document: &SourceDocument) -> Vec<Chunk> {
        let sentences = split_sentences(&document.text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0;

        for &sentence in &sentences {
            if !current.is_empty() && current_len + sentence.len() + 1 > self.chunk_size {
                chunks.push(current.join(" "));

                let (seed, seed_len) = self.overlap_tail(&current);
                current = seed;
                current_len = seed_len;
            }

            current_len += sentence.len() + usize::from(!current.is_empty());
            current.push(sentence);
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
            .into_iter()
            .enumerate()
            .map(|(position, text)| Chunk::new(document.source_id.clone(), position, text))
            .collect()
    }

    /// Trailing sentences of the flushed chunk that fit the overlap
    /// budget, in original order.
    fn overlap_tail<'a>(&self, flushed: &[&'a str]) -> (Vec<&'a str>, usize) {
        let mut seed = Vec::new();
        let mut seed_len = 0;

        for sentence in flushed.iter().rev() {
            if seed_len + sentence.len() > self.chunk_overlap {
                break;
            }
            seed_len += sentence.len() + usize::from(!seed.is_empty());
            seed.push(*sentence);
        }

        seed.reverse();
        (seed, seed_len)
    }
}

/// Sentence segments: maximal runs of text up to and including a
/// `.`/`!`/`?` cluster. Text without terminal punctuation comes back as a
/// single segment.
fn split_sentences(text: &str) -> Vec<&str> {
    static SENTENCE: OnceLock<Regex> = OnceLock::new();
    let pattern = SENTENCE.get_or_init(|| Regex::new(r"[^.!?]+[.!?]*").expect("valid regex"));

    pattern
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}
