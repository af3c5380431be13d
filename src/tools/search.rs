//! The corpus search tool: retrieval exposed to the generation loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{Tool, ToolExecution};
use crate::core::errors::AssistantError;
use crate::corpus::index::CorpusIndex;
use crate::corpus::store::{RetrievalResult, SourceAttribution};

/// Wraps `CorpusIndex` behind the tool contract. Idempotent and side
/// effect free: the only thing it produces besides the formatted text is
/// the attribution list riding along in the `ToolExecution`.
pub struct CorpusSearchTool {
    index: Arc<CorpusIndex>,
    max_results: usize,
}

impl CorpusSearchTool {
    pub fn new(index: Arc<CorpusIndex>, max_results: usize) -> Self {
        Self {
            index,
            max_results: max_results.max(1),
        }
    }

    /// Compact text block for model consumption: one labeled section per
    /// hit, `[source §position]` followed by the chunk text.
    fn format_hits(result: &RetrievalResult) -> String {
        result
            .hits
            .iter()
            .map(|hit| {
                format!(
                    "[{} §{}]\n{}",
                    hit.chunk.source_id, hit.chunk.position, hit.chunk.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn no_results_message(result: &RetrievalResult) -> String {
        match &result.source_filter {
            Some(source) => format!(
                "No relevant course material found for '{}' in source '{}'.",
                result.query, source
            ),
            None => format!(
                "No relevant course material found for '{}'.",
                result.query
            ),
        }
    }
}

#[async_trait]
impl Tool for CorpusSearchTool {
    fn name(&self) -> &str {
        "search_materials"
    }

    fn description(&self) -> &str {
        "Search the indexed course materials for passages relevant to a query. \
         Use for questions about specific course content; optionally restrict \
         the search to a single source document."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for in the course materials"
                },
                "source_id": {
                    "type": "string",
                    "description": "Restrict the search to this source document"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: &Value) -> Result<ToolExecution, AssistantError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or_default();
        if query.is_empty() {
            return Err(AssistantError::InvalidToolArgument(
                "search query must be a non-empty string".to_string(),
            ));
        }

        let source_filter = args
            .get("source_id")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let result = self
            .index
            .search(query, self.max_results, source_filter)
            .await?;

        debug!(query, hits = result.hits.len(), "corpus search executed");

        if result.is_empty() {
            return Ok(ToolExecution::text(Self::no_results_message(&result)));
        }

        let sources: Vec<SourceAttribution> =
            result.hits.iter().map(SourceAttribution::from).collect();

        Ok(ToolExecution {
            output: Self::format_hits(&result),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::sqlite::SqliteChunkStore;
    use crate::corpus::store::Chunk;
    use crate::llm::provider::EmbeddingProvider;

    struct HashEmbedder;

    #[async_trait]
    impl EmbeddingProvider for HashEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AssistantError> {
            Ok(inputs
                .iter()
                .map(|text| {
                    let mut vector = vec![0.0_f32; 16];
                    for word in text.to_lowercase().split_whitespace() {
                        let mut hash: usize = 5381;
                        for byte in word.bytes() {
                            hash = hash.wrapping_mul(33).wrapping_add(byte as usize);
                        }
                        vector[hash % 16] += 1.0;
                    }
                    vector
                })
                .collect())
        }
    }

    async fn seeded_tool() -> CorpusSearchTool {
        let tmp = std::env::temp_dir().join(format!(
            "lectern-search-tool-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        let store = SqliteChunkStore::with_path(tmp).await.unwrap();
        let index = Arc::new(CorpusIndex::new(Arc::new(store), Arc::new(HashEmbedder)));

        index
            .index(vec![
                Chunk::new("lesson-1", 0, "Ownership moves values between bindings."),
                Chunk::new("lesson-2", 0, "Closures capture their environment."),
            ])
            .await
            .unwrap();

        CorpusSearchTool::new(index, 5)
    }

    #[tokio::test]
    async fn formats_hits_and_records_attributions() {
        let tool = seeded_tool().await;

        let execution = tool
            .execute(&json!({ "query": "Closures capture their environment." }))
            .await
            .unwrap();

        assert!(execution.output.starts_with("[lesson-2 §0]"));
        assert!(execution.output.contains("Closures capture"));
        assert_eq!(execution.sources[0].source_id, "lesson-2");
        assert_eq!(execution.sources[0].position, 0);
    }

    #[tokio::test]
    async fn empty_retrieval_is_a_message_not_an_error() {
        let tool = seeded_tool().await;

        let execution = tool
            .execute(&json!({ "query": "anything", "source_id": "lesson-99" }))
            .await
            .unwrap();

        assert!(execution.output.contains("No relevant course material"));
        assert!(execution.output.contains("lesson-99"));
        assert!(execution.sources.is_empty());
    }

    #[tokio::test]
    async fn blank_query_is_an_invalid_argument() {
        let tool = seeded_tool().await;

        let err = tool.execute(&json!({ "query": "   " })).await.unwrap_err();
        assert!(matches!(err, AssistantError::InvalidToolArgument(_)));
    }
}
