//! The coordinator: the one entry point callers see.
//!
//! Wires the corpus index, tool registry, history store, and generation
//! runtime together. All loop state machinery stays behind `query`.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::runtime::AgentRuntime;
use crate::core::config::AssistantConfig;
use crate::core::errors::AssistantError;
use crate::corpus::chunking::{Chunker, SourceDocument};
use crate::corpus::index::CorpusIndex;
use crate::corpus::store::SourceAttribution;
use crate::history::HistoryStore;
use crate::llm::provider::LlmProvider;
use crate::tools::{CorpusSearchTool, Tool, ToolRegistry};

/// What one query returns: the answer, the chunks that backed it, and the
/// session the exchange was committed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub sources: Vec<SourceAttribution>,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusOverview {
    pub total_chunks: usize,
    pub source_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Sources actually indexed this run (already-known ones are skipped).
    pub sources: usize,
    pub chunks: usize,
}

pub struct Assistant {
    config: AssistantConfig,
    index: Arc<CorpusIndex>,
    history: Arc<HistoryStore>,
    runtime: AgentRuntime,
}

impl Assistant {
    /// Build an assistant with the corpus search tool registered.
    pub fn new(
        config: AssistantConfig,
        index: Arc<CorpusIndex>,
        history: Arc<HistoryStore>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self::with_tools(config, index, history, provider, Vec::new())
    }

    /// Like `new`, with additional tools registered after the search tool.
    pub fn with_tools(
        config: AssistantConfig,
        index: Arc<CorpusIndex>,
        history: Arc<HistoryStore>,
        provider: Arc<dyn LlmProvider>,
        extra_tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(CorpusSearchTool::new(
            index.clone(),
            config.max_results,
        )));
        for tool in extra_tools {
            registry.register(tool);
        }

        let runtime = AgentRuntime::new(provider, Arc::new(registry), config.max_tool_rounds);

        Self {
            config,
            index,
            history,
            runtime,
        }
    }

    /// Answer one user query within a session.
    ///
    /// A missing session id mints a new one. The exchange is committed to
    /// history only after the runtime returns a terminal answer; if the
    /// caller drops the future or the run fails, nothing is persisted.
    pub async fn query(
        &self,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<QueryOutcome, AssistantError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::InvalidRequest(
                "query text must not be empty".to_string(),
            ));
        }

        let session_id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(existing) => existing.to_string(),
            None => self.history.create_session().await?,
        };

        let history = self
            .history
            .get_history(&session_id, self.config.max_history)
            .await?;

        let outcome = self.runtime.respond(&history, text).await?;

        self.history
            .append_exchange(&session_id, text, &outcome.answer)
            .await?;

        info!(
            session = %session_id,
            sources = outcome.sources.len(),
            "query answered"
        );

        Ok(QueryOutcome {
            answer: outcome.answer,
            sources: outcome.sources,
            session_id,
        })
    }

    /// Chunk and index a batch of documents. Sources whose id is already
    /// in the index are skipped, so re-running ingestion is idempotent;
    /// use `reindex` first to rebuild from scratch.
    pub async fn ingest(
        &self,
        documents: &[SourceDocument],
    ) -> Result<IngestReport, AssistantError> {
        let known: HashSet<String> = self.index.source_ids().await?.into_iter().collect();
        let chunker = Chunker::from_config(&self.config);

        let mut chunks = Vec::new();
        let mut new_sources = 0;
        for document in documents {
            if known.contains(&document.source_id) {
                debug!(source = %document.source_id, "source already indexed, skipping");
                continue;
            }
            let document_chunks = chunker.chunk_document(document);
            if document_chunks.is_empty() {
                continue;
            }
            new_sources += 1;
            chunks.extend(document_chunks);
        }

        let total = self.index.index(chunks).await?;
        info!(sources = new_sources, chunks = total, "ingestion complete");

        Ok(IngestReport {
            sources: new_sources,
            chunks: total,
        })
    }

    /// Corpus analytics for listing what is searchable.
    pub async fn corpus_overview(&self) -> Result<CorpusOverview, AssistantError> {
        Ok(CorpusOverview {
            total_chunks: self.index.count().await?,
            source_ids: self.index.source_ids().await?,
        })
    }

    /// Drop the whole index; the next `ingest` rebuilds it.
    pub async fn reindex(&self) -> Result<(), AssistantError> {
        self.index.clear().await
    }

    pub async fn create_session(&self) -> Result<String, AssistantError> {
        self.history.create_session().await
    }

    pub async fn list_sessions(
        &self,
    ) -> Result<Vec<crate::history::SessionInfo>, AssistantError> {
        self.history.list_sessions().await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool, AssistantError> {
        self.history.delete_session(session_id).await
    }
}
