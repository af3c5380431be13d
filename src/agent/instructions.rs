use crate::llm::types::ToolSpec;

/// System prompt for the generation loop: assistant persona, grounding
/// rules, and the JSON fallback protocol for models without native tool
/// calling.
pub fn build_instructions(tools: &[ToolSpec]) -> String {
    let tool_lines = if tools.is_empty() {
        "None. Answer from the conversation alone.".to_string()
    } else {
        tools
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are an assistant for questions about a private corpus of course materials.\n\
Ground answers in retrieved material whenever the question concerns course content; \
answer general questions from your own knowledge without searching.\n\
Search at most once per question, then answer from what came back. \
If nothing relevant is found, say so instead of guessing.\n\
Keep answers concise and do not mention the search process itself.\n\
\n\
Available tools:\n{tool_lines}\n\
\n\
If you cannot emit native tool calls, respond ONLY with JSON in one of these forms:\n\
{{\"type\":\"tool_call\",\"tool_name\":\"<tool>\",\"tool_args\":{{...}}}}\n\
{{\"type\":\"final\",\"content\":\"...\"}}"
    )
}
