//! Requirements-introspection tools and `end_conversation` (`spec.md`
//! §4.2), grounded in `original_source/sources/workflow/tools.py`'s
//! `tool_get_all_requirements`/`tool_get_all_requirement_ids`/
//! `tool_get_requirement_data`/`tool_end_conversation`.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolContext};

pub struct GetAllRequirementsTool;

#[async_trait]
impl Tool for GetAllRequirementsTool {
    fn name(&self) -> &str {
        "get_all_requirements"
    }

    fn description(&self) -> &str {
        "Return the full requirements tree (scopes and requirements) as structured data."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Value {
        serde_json::to_value(ctx.requirements.as_ref())
            .unwrap_or_else(|e| json!({ "error": format!("serialize_failed: {e}") }))
    }
}

pub struct GetAllRequirementIdsTool;

#[async_trait]
impl Tool for GetAllRequirementIdsTool {
    fn name(&self) -> &str {
        "get_all_requirement_ids"
    }

    fn description(&self) -> &str {
        "Return the flat list of every requirement id in the document."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Value {
        json!({ "ids": ctx.requirements.all_ids() })
    }
}

pub struct GetRequirementDataTool;

#[async_trait]
impl Tool for GetRequirementDataTool {
    fn name(&self) -> &str {
        "get_requirement_data"
    }

    fn description(&self) -> &str {
        "Return title/description/acceptance for a single requirement id."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "identifier": { "type": "string", "description": "Requirement id to look up." } },
            "required": ["identifier"],
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Value {
        let Some(id) = args.get("identifier").and_then(|v| v.as_str()) else {
            return json!({ "error": "missing required parameter: identifier" });
        };
        match ctx.requirements.find(id) {
            Some(req) => serde_json::to_value(req)
                .unwrap_or_else(|e| json!({ "error": format!("serialize_failed: {e}") })),
            None => json!({ "error": "identifier_unknown" }),
        }
    }
}

/// Packages the agent's claimed final text. Acceptance or rejection of the
/// claim is decided afterwards by the agent-specific termination handler
/// (`spec.md` §4.7), which may replace this tool's output before it is
/// appended to the conversation as the `end_conversation` call's result.
pub struct EndConversationTool;

#[async_trait]
impl Tool for EndConversationTool {
    fn name(&self) -> &str {
        "end_conversation"
    }

    fn description(&self) -> &str {
        "Signal that the task is complete. `final_text` must match the exact token(s) \
         this agent is expected to produce."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "final_text": { "type": "string", "description": "The agent's final output token(s)." } },
            "required": ["final_text"],
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Value {
        let final_text = args.get("final_text").and_then(|v| v.as_str()).unwrap_or_default();
        json!({ "final_text": final_text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::{Requirement, RequirementScope, ScopeChildren};
    use std::sync::Arc;

    fn ctx() -> ToolContext {
        ToolContext {
            root: std::env::temp_dir(),
            requirements: Arc::new(RequirementScope {
                title: "root".into(),
                children: ScopeChildren::Requirements(vec![Requirement {
                    id: "R1".into(),
                    title: "T".into(),
                    description: "D".into(),
                    acceptance: "A".into(),
                }]),
            }),
        }
    }

    #[tokio::test]
    async fn get_all_requirement_ids_lists_everything() {
        let r = GetAllRequirementIdsTool.execute(json!({}), &ctx()).await;
        assert_eq!(r, json!({ "ids": ["R1"] }));
    }

    #[tokio::test]
    async fn get_requirement_data_unknown_id() {
        let r = GetRequirementDataTool.execute(json!({ "identifier": "nope" }), &ctx()).await;
        assert_eq!(r, json!({ "error": "identifier_unknown" }));
    }

    #[tokio::test]
    async fn get_requirement_data_known_id() {
        let r = GetRequirementDataTool.execute(json!({ "identifier": "R1" }), &ctx()).await;
        assert_eq!(r["title"], "T");
    }

    #[tokio::test]
    async fn end_conversation_echoes_final_text() {
        let r = EndConversationTool.execute(json!({ "final_text": "<DONE>" }), &ctx()).await;
        assert_eq!(r, json!({ "final_text": "<DONE>" }));
    }
}
