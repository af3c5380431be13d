//! The generation loop: model call, tool dispatch, model call again,
//! until a final answer or the round bound.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use super::instructions::build_instructions;
use crate::core::errors::AssistantError;
use crate::corpus::store::SourceAttribution;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{ChatMessage, ModelResponse, ToolInvocation};
use crate::tools::ToolRegistry;

/// A successful terminal answer plus every attribution collected during
/// the turn's tool rounds.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub answer: String,
    pub sources: Vec<SourceAttribution>,
}

pub struct AgentRuntime {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    max_rounds: usize,
}

impl AgentRuntime {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        max_rounds: usize,
    ) -> Self {
        Self {
            provider,
            registry,
            max_rounds: max_rounds.max(1),
        }
    }

    /// Run one user turn to completion.
    ///
    /// Tool calls execute strictly in order; each round's results are in
    /// the context before the model is consulted again. Recoverable tool
    /// failures become tool-result text so the model can adapt; provider
    /// failures propagate as `GenerationFailed` untouched. If the model is
    /// still asking for tools after `max_rounds` calls, the turn fails
    /// with `GenerationLoopExceeded`; nothing is fabricated.
    pub async fn respond(
        &self,
        history: &[ChatMessage],
        user_text: &str,
    ) -> Result<GenerationOutcome, AssistantError> {
        let specs = self.registry.specs();

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(build_instructions(&specs)));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(user_text));

        let mut sources: Vec<SourceAttribution> = Vec::new();

        for round in 0..self.max_rounds {
            debug!(round, provider = self.provider.name(), "invoking model");

            match self.provider.generate(&messages, &specs).await? {
                ModelResponse::FinalAnswer(answer) => {
                    debug!(round, sources = sources.len(), "terminal answer");
                    return Ok(GenerationOutcome { answer, sources });
                }
                ModelResponse::ToolCalls(calls) => {
                    for call in calls {
                        messages.push(ChatMessage::assistant(render_invocation(&call)));

                        let result_text = match self
                            .registry
                            .invoke(&call.name, &call.arguments)
                            .await
                        {
                            Ok(execution) => {
                                sources.extend(execution.sources);
                                execution.output
                            }
                            Err(err) if err.is_recoverable() => {
                                warn!(tool = %call.name, error = %err, "tool round failed, feeding back");
                                format!("tool '{}' failed: {}", call.name, err)
                            }
                            Err(err) => return Err(err),
                        };

                        messages.push(ChatMessage::tool(format!(
                            "Tool `{}` result:\n{}",
                            call.name, result_text
                        )));
                    }
                }
            }
        }

        warn!(rounds = self.max_rounds, "model never produced a terminal answer");
        Err(AssistantError::GenerationLoopExceeded {
            rounds: self.max_rounds,
        })
    }
}

/// Context record of what the model asked for, in the same JSON shape the
/// prompt protocol uses.
fn render_invocation(call: &ToolInvocation) -> String {
    json!({
        "type": "tool_call",
        "tool_name": call.name,
        "tool_args": call.arguments,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::llm::types::ToolSpec;
    use crate::tools::{Tool, ToolExecution};

    /// Plays back a fixed script of responses and records every context it
    /// was called with.
    struct ScriptedProvider {
        script: Mutex<VecDeque<ModelResponse>>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<ModelResponse>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn contexts(&self) -> Vec<Vec<ChatMessage>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolSpec],
        ) -> Result<ModelResponse, AssistantError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AssistantError::GenerationFailed("script exhausted".to_string()))
        }
    }

    /// A provider that always requests the same tool, for the bounded-loop
    /// property.
    struct AlwaysToolProvider;

    #[async_trait]
    impl LlmProvider for AlwaysToolProvider {
        fn name(&self) -> &str {
            "always-tool"
        }

        async fn generate(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolSpec],
        ) -> Result<ModelResponse, AssistantError> {
            Ok(ModelResponse::ToolCalls(vec![ToolInvocation {
                id: None,
                name: "noop".to_string(),
                arguments: json!({}),
            }]))
        }
    }

    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }
        fn description(&self) -> &str {
            "does nothing"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, _args: &Value) -> Result<ToolExecution, AssistantError> {
            Ok(ToolExecution::text("done"))
        }
    }

    struct CitingTool;

    #[async_trait]
    impl Tool for CitingTool {
        fn name(&self) -> &str {
            "cite"
        }
        fn description(&self) -> &str {
            "returns a result with an attribution"
        }
        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            })
        }
        async fn execute(&self, _args: &Value) -> Result<ToolExecution, AssistantError> {
            Ok(ToolExecution {
                output: "[lesson-2 §0]\nrelevant text".to_string(),
                sources: vec![SourceAttribution {
                    source_id: "lesson-2".to_string(),
                    position: 0,
                    score: 0.9,
                }],
            })
        }
    }

    fn registry_with(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        Arc::new(registry)
    }

    fn tool_call(name: &str, args: Value) -> ModelResponse {
        ModelResponse::ToolCalls(vec![ToolInvocation {
            id: None,
            name: name.to_string(),
            arguments: args,
        }])
    }

    #[tokio::test]
    async fn immediate_answer_needs_one_round() {
        let provider =
            ScriptedProvider::new(vec![ModelResponse::FinalAnswer("direct answer".to_string())]);
        let runtime = AgentRuntime::new(provider.clone(), registry_with(vec![]), 2);

        let outcome = runtime.respond(&[], "hello").await.unwrap();
        assert_eq!(outcome.answer, "direct answer");
        assert!(outcome.sources.is_empty());
        assert_eq!(provider.contexts().len(), 1);
    }

    #[tokio::test]
    async fn tool_round_accumulates_sources_then_answers() {
        let provider = ScriptedProvider::new(vec![
            tool_call("cite", json!({ "query": "closures" })),
            ModelResponse::FinalAnswer("closures capture their environment".to_string()),
        ]);
        let runtime = AgentRuntime::new(
            provider.clone(),
            registry_with(vec![Arc::new(CitingTool)]),
            2,
        );

        let outcome = runtime.respond(&[], "what are closures?").await.unwrap();
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].source_id, "lesson-2");

        // second round saw the tool result in its context
        let contexts = provider.contexts();
        assert_eq!(contexts.len(), 2);
        let last = contexts[1].last().unwrap();
        assert!(last.content.contains("relevant text"));
    }

    #[tokio::test]
    async fn loop_terminates_when_model_always_wants_tools() {
        let runtime = AgentRuntime::new(
            Arc::new(AlwaysToolProvider),
            registry_with(vec![Arc::new(NoopTool)]),
            3,
        );

        let err = runtime.respond(&[], "loop forever").await.unwrap_err();
        assert!(matches!(
            err,
            AssistantError::GenerationLoopExceeded { rounds: 3 }
        ));
    }

    #[tokio::test]
    async fn unknown_tool_is_fed_back_and_query_completes() {
        let provider = ScriptedProvider::new(vec![
            tool_call("imaginary_tool", json!({})),
            ModelResponse::FinalAnswer("answered without that tool".to_string()),
        ]);
        let runtime = AgentRuntime::new(provider.clone(), registry_with(vec![]), 2);

        let outcome = runtime.respond(&[], "use the imaginary tool").await.unwrap();
        assert_eq!(outcome.answer, "answered without that tool");

        let contexts = provider.contexts();
        let fed_back = contexts[1].last().unwrap();
        assert!(fed_back.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn invalid_arguments_are_fed_back_and_query_completes() {
        let provider = ScriptedProvider::new(vec![
            // missing required "query"
            tool_call("cite", json!({})),
            ModelResponse::FinalAnswer("recovered".to_string()),
        ]);
        let runtime = AgentRuntime::new(
            provider.clone(),
            registry_with(vec![Arc::new(CitingTool)]),
            2,
        );

        let outcome = runtime.respond(&[], "search broken").await.unwrap();
        assert_eq!(outcome.answer, "recovered");

        let contexts = provider.contexts();
        let fed_back = contexts[1].last().unwrap();
        assert!(fed_back.content.contains("invalid tool argument"));
    }

    #[tokio::test]
    async fn provider_failure_propagates_untouched() {
        let provider = ScriptedProvider::new(vec![]);
        let runtime = AgentRuntime::new(provider, registry_with(vec![]), 2);

        let err = runtime.respond(&[], "anything").await.unwrap_err();
        assert!(matches!(err, AssistantError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn history_and_instructions_frame_the_user_turn() {
        let provider = ScriptedProvider::new(vec![ModelResponse::FinalAnswer("ok".to_string())]);
        let runtime = AgentRuntime::new(provider.clone(), registry_with(vec![]), 2);

        let history = vec![
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("earlier answer"),
        ];
        runtime.respond(&history, "follow-up").await.unwrap();

        let context = &provider.contexts()[0];
        assert_eq!(context.len(), 4);
        assert_eq!(context[0].role, crate::llm::types::Role::System);
        assert_eq!(context[1].content, "earlier question");
        assert_eq!(context[3].content, "follow-up");
    }
}
