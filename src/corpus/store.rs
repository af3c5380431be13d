//! Storage contract for the chunk index.
//!
//! The SQLite implementation lives in the `sqlite` module; `CorpusIndex`
//! in `index` layers query embedding on top of whichever backend is used.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::AssistantError;

/// Immutable unit of retrievable text. The embedding vector is held by the
/// store, keyed by `chunk_id`; it never travels with the chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    /// Identifier of the originating document.
    pub source_id: String,
    /// Ordinal of this chunk within its source.
    pub position: usize,
}

impl Chunk {
    pub fn new(source_id: impl Into<String>, position: usize, text: impl Into<String>) -> Self {
        let source_id: String = source_id.into();
        Self {
            chunk_id: format!("{}#{}", source_id, position),
            text: text.into(),
            source_id,
            position,
        }
    }
}

/// One search hit. Higher score means more similar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Output of one search call: the hits plus the query and filter that
/// produced them. Built per call and consumed immediately; never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: String,
    pub source_filter: Option<String>,
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Citation record handed back to the caller: which chunk backed the
/// answer, and how strongly it matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub source_id: String,
    pub position: usize,
    pub score: f32,
}

impl From<&ScoredChunk> for SourceAttribution {
    fn from(hit: &ScoredChunk) -> Self {
        Self {
            source_id: hit.chunk.source_id.clone(),
            position: hit.chunk.position,
            score: hit.score,
        }
    }
}

/// Persistence backend for chunk+vector pairs.
///
/// `search` takes an already-embedded query; embedding text belongs to the
/// layer above so every backend ranks with the same vectors it ingested.
#[async_trait]
pub trait ChunkStorage: Send + Sync {
    /// Write chunk+vector pairs atomically, preserving input order.
    async fn insert_batch(&self, items: Vec<(Chunk, Vec<f32>)>) -> Result<(), AssistantError>;

    /// Return up to `top_k` chunks by descending similarity. Equal scores
    /// keep ingestion order. An empty store yields an empty vec.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, AssistantError>;

    /// Chunk count, optionally restricted to one source.
    async fn count(&self, source_id: Option<&str>) -> Result<usize, AssistantError>;

    /// Distinct source ids in ingestion order.
    async fn source_ids(&self) -> Result<Vec<String>, AssistantError>;

    /// Drop every chunk. Used when the corpus is re-indexed from scratch.
    async fn clear(&self) -> Result<(), AssistantError>;
}
