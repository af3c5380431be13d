//! Model-invocable tools and the registry that dispatches them by name.

pub mod search;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::errors::AssistantError;
use crate::corpus::store::SourceAttribution;
use crate::llm::types::ToolSpec;

pub use search::CorpusSearchTool;

/// What a tool hands back: the text the model sees, plus any citation
/// records collected on the side for the end caller.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub output: String,
    pub sources: Vec<SourceAttribution>,
}

impl ToolExecution {
    /// A plain text result with no attributions.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            sources: Vec::new(),
        }
    }
}

/// A named, schema-described capability the model may request.
///
/// `parameters_schema` must be a JSON-Schema object; argument payloads are
/// validated against it before `execute` runs, so implementations can rely
/// on required fields being present and correctly typed.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Model-facing description: this is what the model reads to decide
    /// whether to call the tool.
    fn description(&self) -> &str;

    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: &Value) -> Result<ToolExecution, AssistantError>;
}

/// Holds registered tools and dispatches invocations by name.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Re-registering a name replaces the prior binding
    /// in place (last write wins), keeping spec order deterministic.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if let Some(slot) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            *slot = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Specs for every registered tool, in registration order. This is
    /// what the model is shown.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// Validate `args` against the tool's declared schema, then execute.
    ///
    /// Unknown names fail with `UnknownTool` and schema violations with
    /// `InvalidToolArgument`; both are recoverable and become tool-result
    /// text in the generation loop rather than aborting the query.
    pub async fn invoke(&self, name: &str, args: &Value) -> Result<ToolExecution, AssistantError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| AssistantError::UnknownTool(name.to_string()))?;

        let schema = tool.parameters_schema();
        let validator = jsonschema::validator_for(&schema).map_err(|e| {
            AssistantError::InvalidToolArgument(format!(
                "tool '{}' declares an unusable schema: {}",
                name, e
            ))
        })?;
        if let Err(violation) = validator.validate(args) {
            return Err(AssistantError::InvalidToolArgument(format!(
                "tool '{}': {}",
                name, violation
            )));
        }

        tool.execute(args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct EchoTool {
        reply: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the given text back"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: &Value) -> Result<ToolExecution, AssistantError> {
            let text = args["text"].as_str().unwrap_or_default();
            Ok(ToolExecution::text(format!("{}: {}", self.reply, text)))
        }
    }

    #[tokio::test]
    async fn invoke_dispatches_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { reply: "heard" }));

        let execution = registry
            .invoke("echo", &json!({ "text": "hello" }))
            .await
            .unwrap();
        assert_eq!(execution.output, "heard: hello");
        assert!(execution.sources.is_empty());
    }

    #[tokio::test]
    async fn unknown_name_is_a_typed_error() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("nope", &json!({})).await.unwrap_err();
        assert!(matches!(err, AssistantError::UnknownTool(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn missing_required_argument_is_rejected_before_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { reply: "heard" }));

        let err = registry.invoke("echo", &json!({})).await.unwrap_err();
        assert!(matches!(err, AssistantError::InvalidToolArgument(_)));

        let err = registry
            .invoke("echo", &json!({ "text": 7 }))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::InvalidToolArgument(_)));
    }

    #[tokio::test]
    async fn re_registration_replaces_the_binding() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { reply: "first" }));
        registry.register(Arc::new(EchoTool { reply: "second" }));

        assert_eq!(registry.specs().len(), 1);
        let execution = registry
            .invoke("echo", &json!({ "text": "x" }))
            .await
            .unwrap();
        assert_eq!(execution.output, "second: x");
    }

    #[test]
    fn specs_keep_registration_order() {
        struct Named(&'static str);

        #[async_trait]
        impl Tool for Named {
            fn name(&self) -> &str {
                self.0
            }
            fn description(&self) -> &str {
                "test tool"
            }
            fn parameters_schema(&self) -> Value {
                json!({ "type": "object" })
            }
            async fn execute(&self, _args: &Value) -> Result<ToolExecution, AssistantError> {
                Ok(ToolExecution::text(""))
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Named("b")));
        registry.register(Arc::new(Named("a")));

        let names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
