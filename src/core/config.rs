use serde::{Deserialize, Serialize};

/// Tunables for the query core.
///
/// Hosts load and validate whatever config file or environment they use and
/// hand the result over as this struct; every field has a usable default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in characters.
    pub chunk_overlap: usize,
    /// Number of chunks a search returns to the model.
    pub max_results: usize,
    /// Conversation window, measured in exchanges (user + assistant pair).
    pub max_history: usize,
    /// Upper bound on model calls per query. The loop terminates with
    /// `GenerationLoopExceeded` once this many rounds have run.
    pub max_tool_rounds: usize,
    /// Chat model identifier passed to the provider.
    pub chat_model: String,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            max_results: 5,
            max_history: 2,
            max_tool_rounds: 2,
            chat_model: "claude-sonnet-4-20250514".to_string(),
            embedding_model: "all-MiniLM-L6-v2".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = AssistantConfig::default();
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.max_results, 5);
        assert_eq!(config.max_history, 2);
        assert!(config.max_tool_rounds >= 1);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: AssistantConfig =
            serde_json::from_str(r#"{"max_history": 4, "chat_model": "local-model"}"#).unwrap();
        assert_eq!(config.max_history, 4);
        assert_eq!(config.chat_model, "local-model");
        assert_eq!(config.chunk_size, 800);
    }
}
