//! Query core of a course-materials RAG assistant.
//!
//! Turns a natural-language question into a grounded answer by combining
//! semantic retrieval over an ingested corpus with a bounded tool-calling
//! generation loop, while keeping per-session history windowed.
//!
//! The [`assistant::Assistant`] coordinator is the one externally callable
//! surface; hosts bring their own transport, document extraction, and an
//! [`llm::LlmProvider`] implementation (or use the bundled
//! OpenAI-compatible one).

pub mod agent;
pub mod assistant;
pub mod core;
pub mod corpus;
pub mod history;
pub mod llm;
pub mod logging;
pub mod tools;
pub mod vector_math;

pub use assistant::{Assistant, CorpusOverview, IngestReport, QueryOutcome};
pub use crate::core::config::AssistantConfig;
pub use crate::core::errors::AssistantError;
pub use corpus::chunking::SourceDocument;
pub use corpus::index::CorpusIndex;
pub use corpus::sqlite::SqliteChunkStore;
pub use corpus::store::{Chunk, RetrievalResult, SourceAttribution};
pub use history::HistoryStore;
pub use llm::{
    ChatMessage, EmbeddingProvider, LlmProvider, ModelResponse, OpenAiCompatProvider, Role,
    ToolInvocation, ToolSpec,
};
pub use tools::{CorpusSearchTool, Tool, ToolExecution, ToolRegistry};
