pub mod instructions;
pub mod runtime;

pub use runtime::{AgentRuntime, GenerationOutcome};
