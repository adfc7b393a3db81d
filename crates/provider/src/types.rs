use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One turn in an agent's message history.
///
/// `spec.md` §3's "message history" is heterogeneous (system/user/model/
/// tool-result turns); per §9's Design Notes this is modeled as a sum type
/// rather than the teacher's `ChatRequest { system: Option<String>, .. }` +
/// flat message list shape — the system turn is item zero of `input`,
/// matching `sources/workflow/agents.py`'s `self._messages = [{"role":
/// "system", ...}]` seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageItem {
    System { content: String },
    User { content: String },
    AssistantText { content: String },
    Reasoning { content: String },
    ToolCall { call_id: String, name: String, arguments: Value },
    ToolResult { call_id: String, output: Value },
}

/// A tool exposed to the model, in the shape every provider's function-
/// calling API expects (name/description/JSON-schema parameters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A single-shot request. `tool_choice` is always `"auto"` and
/// `parallel_tool_calls` is always `false` per `spec.md` §4.5 — tool calls
/// must be serialized for deterministic filesystem state (§4.6).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub input: Vec<MessageItem>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub total_tokens: u64,
}

/// One item in the provider's ordered response output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Text { content: String },
    Reasoning { content: String },
    ToolCall { call_id: String, name: String, arguments: Value },
}

#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub output: Vec<OutputItem>,
    pub usage: Usage,
}
