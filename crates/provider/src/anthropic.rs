use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{parse_retry_after_ms, ProviderError};
use crate::types::{ChatRequest, MessageItem, ModelResponse, OutputItem, Usage};
use crate::Provider;

const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Single-shot Anthropic Messages API client.
///
/// Mirrors `OpenAiProvider` in shape; the system turn is pulled out of
/// `input` into Anthropic's dedicated top-level `system` field since the
/// Messages API has no `role: "system"` message, while tool calls/results
/// are translated to `tool_use`/`tool_result` content blocks.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.anthropic.com/v1".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client build");
        Self { client, api_key, base_url }
    }

    fn build_body(&self, model: &str, request: &ChatRequest) -> Value {
        let mut system = String::new();
        let mut messages: Vec<Value> = Vec::new();

        for item in &request.input {
            match item {
                MessageItem::System { content } => {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(content);
                }
                MessageItem::User { content } => {
                    messages.push(json!({ "role": "user", "content": content }));
                }
                MessageItem::AssistantText { content } => {
                    messages.push(json!({ "role": "assistant", "content": content }));
                }
                MessageItem::Reasoning { .. } => {}
                MessageItem::ToolCall { call_id, name, arguments } => {
                    messages.push(json!({
                        "role": "assistant",
                        "content": [{
                            "type": "tool_use",
                            "id": call_id,
                            "name": name,
                            "input": arguments,
                        }]
                    }));
                }
                MessageItem::ToolResult { call_id, output } => {
                    messages.push(json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": call_id,
                            "content": output.to_string(),
                        }]
                    }));
                }
            }
        }

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();

        json!({
            "model": model,
            "system": system,
            "messages": messages,
            "tools": tools,
            "tool_choice": { "type": "auto", "disable_parallel_tool_use": true },
            "max_tokens": MAX_OUTPUT_TOKENS,
        })
    }

    fn parse_output(&self, body: &Value) -> Result<ModelResponse, ProviderError> {
        let blocks = body
            .get("content")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderError::DeserializationError("missing `content` array".into()))?;

        let mut output = Vec::with_capacity(blocks.len());
        for block in blocks {
            let kind = block.get("type").and_then(|v| v.as_str()).unwrap_or("");
            match kind {
                "text" => {
                    let content = block.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string();
                    output.push(OutputItem::Text { content });
                }
                "thinking" => {
                    let content = block.get("thinking").and_then(|v| v.as_str()).unwrap_or("").to_string();
                    output.push(OutputItem::Reasoning { content });
                }
                "tool_use" => {
                    let call_id = block.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                    let name = block.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                    let arguments = block.get("input").cloned().unwrap_or(Value::Null);
                    output.push(OutputItem::ToolCall { call_id, name, arguments });
                }
                _ => {}
            }
        }

        let input_tokens = body
            .get("usage")
            .and_then(|u| u.get("input_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let output_tokens = body
            .get("usage")
            .and_then(|u| u.get("output_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Ok(ModelResponse {
            output,
            usage: Usage { total_tokens: input_tokens + output_tokens },
        })
    }
}

#[async_trait::async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn respond(&self, model: &str, request: &ChatRequest) -> Result<ModelResponse, ProviderError> {
        let body = self.build_body(model, request);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
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
