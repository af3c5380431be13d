use thiserror::Error;

/// Failure taxonomy for the query core.
///
/// The first three variants are recoverable inside a single tool round:
/// they are rendered into a tool-result message and handed back to the
/// model instead of aborting the query. Everything else propagates to the
/// caller as a typed failure.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("invalid tool argument: {0}")]
    InvalidToolArgument(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("search index unavailable: {0}")]
    IndexUnavailable(String),
    #[error("generation loop exceeded after {rounds} model rounds")]
    GenerationLoopExceeded { rounds: usize },
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AssistantError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        AssistantError::Storage(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        AssistantError::GenerationFailed(err.to_string())
    }

    /// Whether the error stays inside the tool loop (fed back to the model
    /// as a tool-result) rather than aborting the query.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AssistantError::InvalidToolArgument(_)
                | AssistantError::UnknownTool(_)
                | AssistantError::IndexUnavailable(_)
        )
    }
}
