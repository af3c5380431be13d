use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{EmbeddingProvider, LlmProvider};
use super::types::{ChatMessage, ModelResponse, Role, ToolInvocation, ToolSpec};
use crate::core::errors::AssistantError;

/// Provider speaking the OpenAI-compatible chat/embeddings HTTP surface
/// (LM Studio, Ollama, vLLM, hosted gateways).
///
/// Tool calling uses the native `tools` field when the backing model
/// supports it; as a fallback, a bare JSON object in the answer text that
/// follows the prompt protocol from `agent::instructions` is also
/// recognized, so local models without native tool support still work.
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    chat_model: String,
    embedding_model: String,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: impl Into<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            client: Client::new(),
        }
    }

    fn wire_messages(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                // Tool results travel as plain context turns; threading
                // provider-specific tool_call ids would leak wire details
                // into the orchestrator.
                let role = match m.role {
                    Role::Tool => "system",
                    other => other.as_str(),
                };
                json!({ "role": role, "content": m.content })
            })
            .collect()
    }

    fn wire_tools(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, AssistantError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.chat_model,
            "messages": Self::wire_messages(messages),
            "stream": false,
        });
        if !tools.is_empty() {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("tools".to_string(), Value::Array(Self::wire_tools(tools)));
            }
        }

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(AssistantError::generation)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AssistantError::GenerationFailed(format!(
                "chat completion returned {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(AssistantError::generation)?;
        let message = payload
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("message"))
            .ok_or_else(|| {
                AssistantError::GenerationFailed("response carried no choices".to_string())
            })?;

        if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
            let invocations: Vec<ToolInvocation> =
                calls.iter().filter_map(parse_native_tool_call).collect();
            if !invocations.is_empty() {
                return Ok(ModelResponse::ToolCalls(invocations));
            }
        }

        let content = message
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(parse_decision(&content))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatProvider {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AssistantError> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(AssistantError::generation)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AssistantError::GenerationFailed(format!(
                "embedding request returned {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(AssistantError::generation)?;

        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    let vec: Vec<f32> = vals
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect();
                    embeddings.push(vec);
                }
            }
        }

        if embeddings.len() != inputs.len() {
            return Err(AssistantError::GenerationFailed(format!(
                "embedding count mismatch: asked {}, got {}",
                inputs.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}

fn parse_native_tool_call(call: &Value) -> Option<ToolInvocation> {
    let function = call.get("function")?;
    let name = function.get("name")?.as_str()?.to_string();

    // OpenAI encodes arguments as a JSON string; some local servers send
    // the object directly.
    let arguments = match function.get("arguments") {
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| json!({ "input": raw }))
        }
        Some(other) => other.clone(),
        None => json!({}),
    };

    Some(ToolInvocation {
        id: call.get("id").and_then(|v| v.as_str()).map(String::from),
        name,
        arguments,
    })
}

/// Interpret answer text under the JSON prompt protocol. Anything that is
/// not a well-formed protocol object is the final answer as-is.
fn parse_decision(text: &str) -> ModelResponse {
    if let Some(value) = parse_json_from_text(text) {
        let action = value
            .get("type")
            .or_else(|| value.get("action"))
            .and_then(|v| v.as_str())
            .unwrap_or("");

        if action == "tool_call" {
            if let Some(name) = value
                .get("tool_name")
                .or_else(|| value.get("name"))
                .and_then(|v| v.as_str())
            {
                let arguments = value
                    .get("tool_args")
                    .or_else(|| value.get("args"))
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                return ModelResponse::ToolCalls(vec![ToolInvocation {
                    id: None,
                    name: name.to_string(),
                    arguments,
                }]);
            }
        }

        if action == "final" {
            let content = value
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            return ModelResponse::FinalAnswer(content);
        }
    }

    ModelResponse::FinalAnswer(text.trim().to_string())
}

fn parse_json_from_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
}
