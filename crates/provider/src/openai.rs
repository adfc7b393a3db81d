use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{parse_retry_after_ms, ProviderError};
use crate::types::{ChatRequest, MessageItem, ModelResponse, OutputItem, Usage};
use crate::Provider;

/// Single-shot OpenAI Responses API client.
///
/// Grounded in `crates/provider/src/openai.rs` from the teacher (client
/// construction, Bearer auth, `reqwest::Client` with a fixed timeout) but
/// reduced to one non-streaming call against `/responses`, matching
/// `sources/workflow/agents.py`'s `client.responses.create(...)`.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client build");
        Self { client, api_key, base_url }
    }

    fn build_body(&self, model: &str, request: &ChatRequest) -> Value {
        let input: Vec<Value> = request
            .input
            .iter()
            .map(|item| match item {
                MessageItem::System { content } => json!({ "role": "system", "content": content }),
                MessageItem::User { content } => json!({ "role": "user", "content": content }),
                MessageItem::AssistantText { content } => {
                    json!({ "role": "assistant", "content": content })
                }
                MessageItem::Reasoning { content } => {
                    json!({ "type": "reasoning", "content": content })
                }
                MessageItem::ToolCall { call_id, name, arguments } => json!({
                    "type": "function_call",
                    "call_id": call_id,
                    "name": name,
                    "arguments": arguments.to_string(),
                }),
                MessageItem::ToolResult { call_id, output } => json!({
                    "type": "function_call_output",
                    "call_id": call_id,
                    "output": output.to_string(),
                }),
            })
            .collect();

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();

        json!({
            "model": model,
            "input": input,
            "tools": tools,
            "tool_choice": "auto",
            "parallel_tool_calls": false,
        })
    }

    fn parse_output(&self, body: &Value) -> Result<ModelResponse, ProviderError> {
        let items = body
            .get("output")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderError::DeserializationError("missing `output` array".into()))?;

        let mut output = Vec::with_capacity(items.len());
        for item in items {
            let kind = item.get("type").and_then(|v| v.as_str()).unwrap_or("");
            match kind {
                "message" => {
                    let text = item
                        .get("content")
                        .and_then(|c| c.as_array())
                        .and_then(|arr| arr.first())
                        .and_then(|c| c.get("text"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    output.push(OutputItem::Text { content: text });
                }
                "reasoning" => {
                    let content = item
                        .get("summary")
                        .and_then(|v| v.as_array())
                        .and_then(|arr| arr.first())
                        .and_then(|c| c.get("text"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    output.push(OutputItem::Reasoning { content });
                }
                "function_call" => {
                    let call_id = item
                        .get("call_id")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let name = item
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let arguments: Value = item
                        .get("arguments")
                        .and_then(|v| v.as_str())
                        .and_then(|s| serde_json::from_str(s).ok())
                        .unwrap_or(Value::Null);
                    output.push(OutputItem::ToolCall { call_id, name, arguments });
                }
                _ => {}
            }
        }

        let total_tokens = body
            .get("usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Ok(ModelResponse { output, usage: Usage { total_tokens } })
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn respond(&self, model: &str, request: &ChatRequest) -> Result<ModelResponse, ProviderError> {
        let body = self.build_body(model, request);

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::HttpError { status: 0, body: e.to_string() })?;

        let status = response.status();
        let retry_after_header = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok())
            .map(|secs| (secs * 1000.0).round() as u64);

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::HttpError { status: status.as_u16(), body: e.to_string() })?;

        if status.as_u16() == 429 {
            let retry_after_ms = retry_after_header
                .or_else(|| parse_retry_after_ms(&text))
                .unwrap_or(5_000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }

        if !status.is_success() {
            return Err(ProviderError::HttpError { status: status.as_u16(), body: text });
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::DeserializationError(e.to_string()))?;
        self.parse_output(&parsed)
    }
}
