use async_trait::async_trait;

use super::types::{ChatMessage, ModelResponse, ToolSpec};
use crate::core::errors::AssistantError;

/// The opaque generation capability.
///
/// One call, one round: the provider gets the full context plus the tool
/// specs the model may request, and returns either a final answer or tool
/// calls. Transport and parse failures come back as `GenerationFailed`;
/// this crate never retries them.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name for logs (e.g. "openai-compat")
    fn name(&self) -> &str;

    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, AssistantError>;
}

/// Text-to-vector capability used at ingestion and query time. The chunk
/// store embeds queries through the same provider it ingested with, so
/// rankings stay comparable.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AssistantError>;
}
