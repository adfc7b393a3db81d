//! Single-shot agent runtime (`spec.md` §4.6): drives one conversation to
//! termination within a fixed step budget, dispatching tool calls serially
//! so filesystem state stays deterministic. Grounded in the conversation
//! loop of `original_source/sources/workflow/agents.py`'s `Agent.query`,
//! reshaped around the teacher's `Tool`/provider split rather than that
//! file's embedded OpenAI client.

use serde_json::{json, Value};

use lift_provider::{ChatRequest, MessageItem, ModelResponse, Provider, ProviderError};

use crate::tools::{ToolContext, ToolRegistry};

const MAX_STEPS: u32 = 50;

/// The result of dispatching one tool call. Every tool besides
/// `end_conversation` can only ever succeed or fail; `end_conversation`'s
/// outcome is decided by the agent-specific [`TerminationHandler`], which
/// may accept, reject (continue the conversation), or report a final
/// verdict (`spec.md` §4.7).
#[derive(Debug, Clone)]
pub enum ToolCallOutcome {
    CallSucceeded(Value),
    CallError(Value),
    EndAccepted,
    EndRejected { reason: String },
    EndFinalSuite,
    EndReworkReq,
}

impl ToolCallOutcome {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::EndAccepted | Self::EndFinalSuite | Self::EndReworkReq)
    }

    /// The payload appended to the conversation as this call's tool
    /// result. A single append per call, using whatever the handler
    /// decided — mirrors `agents.py`'s `_handle_end_conv_attempt`
    /// reassigning `result` before the one `function_call_output` append.
    fn as_tool_result(&self) -> Value {
        match self {
            Self::CallSucceeded(v) | Self::CallError(v) => v.clone(),
            Self::EndAccepted | Self::EndFinalSuite => json!({ "conversation_end": true }),
            Self::EndReworkReq => json!({ "conversation_end": true, "verdict": "rework" }),
            Self::EndRejected { reason } => json!({ "conversation_end": false, "reason": reason }),
        }
    }
}

/// Decides whether an `end_conversation` attempt is accepted, for a
/// specific agent specialization. Implementors check the claimed final
/// text against that agent's termination grammar and, where required, the
/// presence of an expected output file (`spec.md` §4.7).
pub trait TerminationHandler: Send + Sync {
    fn handle_end_conversation(&self, final_text: &str) -> ToolCallOutcome;
}

/// Why an agent's conversation ended. Only produced on a terminal
/// [`ToolCallOutcome`] or a step-budget exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentResult {
    Accepted,
    FinalSuite,
    ReworkRequested,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub result: AgentResult,
    pub history: Vec<MessageItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("model provider failed: {0}")]
    NoModelResponse(#[from] ProviderError),
    #[error("conversation did not terminate within {0} steps")]
    ConversationDidNotTerminate(u32),
}

/// Drives one agent's conversation: model call, tool dispatch, termination
/// check, repeat, up to [`MAX_STEPS`] times.
pub struct AgentRuntime<'a> {
    provider: &'a dyn Provider,
    model: String,
    tools: &'a ToolRegistry,
    tool_ctx: ToolContext,
}

impl<'a> AgentRuntime<'a> {
    pub fn new(provider: &'a dyn Provider, model: String, tools: &'a ToolRegistry, tool_ctx: ToolContext) -> Self {
        Self { provider, model, tools, tool_ctx }
    }

    pub async fn run(
        &self,
        system_prompt: String,
        initial_message: String,
        termination: &dyn TerminationHandler,
    ) -> Result<AgentOutcome, AgentError> {
        let mut history = vec![
            MessageItem::System { content: system_prompt },
            MessageItem::User { content: initial_message },
        ];

        for step in 0..MAX_STEPS {
            let request = ChatRequest { model: self.model.clone(), input: history.clone(), tools: self.tools.specs() };
            let response: ModelResponse = lift_provider::call_with_retry(self.provider, &self.model, &request).await?;

            for item in response.output {
                match item {
                    lift_provider::OutputItem::Text { content } => {
                        history.push(MessageItem::AssistantText { content });
                    }
                    lift_provider::OutputItem::Reasoning { content } => {
                        history.push(MessageItem::Reasoning { content });
                    }
                    lift_provider::OutputItem::ToolCall { call_id, name, arguments } => {
                        tracing::info!(step, tool = %name, args = %preview(&redact_tool_args(&name, &arguments)), "tool call");
                        history.push(MessageItem::ToolCall {
                            call_id: call_id.clone(),
                            name: name.clone(),
                            arguments: arguments.clone(),
                        });

                        let outcome = match self.tools.dispatch(&name, arguments, &self.tool_ctx).await {
                            Err(unknown) => ToolCallOutcome::CallError(json!({ "error": unknown.to_string() })),
                            Ok(result) if name == "end_conversation" => {
                                let final_text = result.get("final_text").and_then(|v| v.as_str()).unwrap_or_default();
                                termination.handle_end_conversation(final_text)
                            }
                            Ok(result) => ToolCallOutcome::CallSucceeded(result),
                        };

                        let payload = outcome.as_tool_result();
                        tracing::info!(step, tool = %name, result = %preview(&redact_tool_result(&name, &payload)), "tool result");
                        history.push(MessageItem::ToolResult { call_id, output: payload });

                        if outcome.is_terminal() {
                            let result = match outcome {
                                ToolCallOutcome::EndAccepted => AgentResult::Accepted,
                                ToolCallOutcome::EndFinalSuite => AgentResult::FinalSuite,
                                ToolCallOutcome::EndReworkReq => AgentResult::ReworkRequested,
                                _ => unreachable!("is_terminal() guards this match"),
                            };
                            return Ok(AgentOutcome { result, history });
                        }
                    }
                }
            }
        }

        Err(AgentError::ConversationDidNotTerminate(MAX_STEPS))
    }
}

/// Hides the bulk of a large text payload before it is logged, matching
/// `agents.py`'s `_redact_tool_args`/`_redact_tool_result` helpers — the
/// conversation itself keeps the full content, only the log line is
/// shortened.
fn redact_tool_args(name: &str, args: &Value) -> Value {
    redact_fields(name, args, &["content", "replace", "find"])
}

fn redact_tool_result(name: &str, result: &Value) -> Value {
    redact_fields(name, result, &["text", "base64_data"])
}

fn redact_fields(_name: &str, value: &Value, fields: &[&str]) -> Value {
    let Value::Object(map) = value else { return value.clone() };
    let mut redacted = map.clone();
    for field in fields {
        if let Some(Value::String(s)) = redacted.get(*field) {
            if s.len() > 200 {
                redacted.insert(
                    (*field).to_string(),
                    json!(format!("{}… ({} bytes, redacted)", truncate_at_char_boundary(s, 200), s.len())),
                );
            }
        }
    }
    Value::Object(redacted)
}

fn preview(value: &Value) -> String {
    let s = value.to_string();
    if s.len() > 500 {
        format!("{}… ({} bytes)", truncate_at_char_boundary(&s, 500), s.len())
    } else {
        s
    }
}

/// Truncates `s` to at most `max_bytes`, backing off to the nearest
/// preceding UTF-8 char boundary so multi-byte characters aren't split.
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    let mut end = max_bytes.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lift_provider::{OutputItem, ToolSpec, Usage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct ScriptedProvider {
        step: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn respond(&self, _model: &str, _request: &ChatRequest) -> Result<ModelResponse, ProviderError> {
            let n = self.step.fetch_add(1, Ordering::SeqCst);
            let output = if n == 0 {
                vec![OutputItem::ToolCall {
                    call_id: "call_1".into(),
                    name: "end_conversation".into(),
                    arguments: json!({ "final_text": "<DONE>" }),
                }]
            } else {
                vec![]
            };
            Ok(ModelResponse { output, usage: Usage { total_tokens: 0 } })
        }
    }

    struct AlwaysAccept;
    impl TerminationHandler for AlwaysAccept {
        fn handle_end_conversation(&self, final_text: &str) -> ToolCallOutcome {
            if final_text == "<DONE>" {
                ToolCallOutcome::EndAccepted
            } else {
                ToolCallOutcome::EndRejected { reason: "wrong token".into() }
            }
        }
    }

    fn empty_registry_ctx() -> (ToolRegistry, ToolContext) {
        let registry = ToolRegistry::new();
        let ctx = ToolContext {
            root: std::env::temp_dir(),
            requirements: Arc::new(crate::requirements::RequirementScope {
                title: "root".into(),
                children: crate::requirements::ScopeChildren::Requirements(vec![]),
            }),
        };
        (registry, ctx)
    }

    #[tokio::test]
    async fn accepted_end_conversation_terminates_loop() {
        let (registry, ctx) = empty_registry_ctx();
        let provider = ScriptedProvider { step: AtomicU32::new(0) };
        let runtime = AgentRuntime::new(&provider, "test-model".into(), &registry, ctx);
        let outcome = runtime
            .run("system".into(), "go".into(), &AlwaysAccept)
            .await
            .unwrap();
        assert_eq!(outcome.result, AgentResult::Accepted);
        assert_eq!(provider.step.load(Ordering::SeqCst), 1);
    }

    struct NeverCallsTools;
    #[async_trait::async_trait]
    impl Provider for NeverCallsTools {
        fn name(&self) -> &str {
            "idle"
        }
        async fn respond(&self, _model: &str, _request: &ChatRequest) -> Result<ModelResponse, ProviderError> {
            Ok(ModelResponse { output: vec![], usage: Usage { total_tokens: 0 } })
        }
    }

    #[tokio::test]
    async fn exhausting_step_budget_is_an_error() {
        let (registry, ctx) = empty_registry_ctx();
        let provider = NeverCallsTools;
        let runtime = AgentRuntime::new(&provider, "test-model".into(), &registry, ctx);
        let err = runtime.run("system".into(), "go".into(), &AlwaysAccept).await.unwrap_err();
        assert!(matches!(err, AgentError::ConversationDidNotTerminate(50)));
    }

    #[test]
    fn specs_roundtrip_through_tool_registry() {
        let (registry, _ctx) = empty_registry_ctx();
        let specs: Vec<ToolSpec> = registry.specs();
        assert_eq!(specs.len(), 10);
    }
}
