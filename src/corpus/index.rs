//! The corpus index: chunk storage plus the embedding function that feeds
//! it. Queries are embedded with the same provider that embedded the
//! chunks, so cosine rankings stay comparable.

use std::sync::Arc;

use tracing::debug;

use super::store::{Chunk, ChunkStorage, RetrievalResult};
use crate::core::errors::AssistantError;
use crate::llm::provider::EmbeddingProvider;

pub struct CorpusIndex {
    store: Arc<dyn ChunkStorage>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl CorpusIndex {
    pub fn new(store: Arc<dyn ChunkStorage>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Embed and store a batch of chunks. The write is transactional, so
    /// concurrent searches see either none or all of the batch.
    pub async fn index(&self, chunks: Vec<Chunk>) -> Result<usize, AssistantError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AssistantError::Storage(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let total = chunks.len();
        let items: Vec<(Chunk, Vec<f32>)> = chunks.into_iter().zip(embeddings).collect();
        self.store.insert_batch(items).await?;

        debug!(chunks = total, "indexed chunk batch");
        Ok(total)
    }

    /// Embed `query_text` and return the `top_k` most similar chunks,
    /// optionally restricted to one source. An empty corpus or a filter
    /// that matches nothing yields an empty result, not an error; any
    /// failure on this path surfaces as `IndexUnavailable`.
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        source_filter: Option<&str>,
    ) -> Result<RetrievalResult, AssistantError> {
        if top_k == 0 {
            return Err(AssistantError::InvalidRequest(
                "top_k must be a positive integer".to_string(),
            ));
        }

        let query_input = [query_text.to_string()];
        let query_embedding = self
            .embedder
            .embed(&query_input)
            .await
            .map_err(|e| AssistantError::IndexUnavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AssistantError::IndexUnavailable("embedder returned no vector".to_string())
            })?;

        let hits = self
            .store
            .search(&query_embedding, top_k, source_filter)
            .await
            .map_err(|e| match e {
                AssistantError::InvalidRequest(_) => e,
                other => AssistantError::IndexUnavailable(other.to_string()),
            })?;

        Ok(RetrievalResult {
            query: query_text.to_string(),
            source_filter: source_filter.map(String::from),
            hits,
        })
    }

    pub async fn count(&self) -> Result<usize, AssistantError> {
        self.store.count(None).await
    }

    pub async fn source_ids(&self) -> Result<Vec<String>, AssistantError> {
        self.store.source_ids().await
    }

    /// Drop the whole index so the corpus can be ingested from scratch
    /// (e.g. after an embedding model change invalidates all vectors).
    pub async fn clear(&self) -> Result<(), AssistantError> {
        self.store.clear().await
    }
}
