//! Tool registry (`spec.md` §4.2): the fixed, immutable set of tools every
//! agent may invoke. Shaped after the teacher's `Tool` trait
//! (`nyzhi-core::tools::Tool`) — name/description/schema/execute — reduced
//! to LIFT's ten tools and an infallible `execute` (tool-level failures
//! are structured `{"error": ...}` payloads per `spec.md` §7, never
//! `Result::Err`; only an unknown tool name is a dispatch-level error).

pub mod filesystem;
pub mod requirements_tools;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::requirements::RequirementScope;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Value;
}

/// Everything a tool implementation needs: the sandboxed project root and
/// the process-wide, read-only requirements tree.
#[derive(Clone)]
pub struct ToolContext {
    pub root: PathBuf,
    pub requirements: Arc<RequirementScope>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown tool: {0}")]
pub struct UnknownTool(pub String);

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Builds the fixed ten-tool registry (`spec.md` §4.2). The agent-
    /// facing spec list and the dispatch table are derived from the same
    /// `tools` vector to avoid drift (`spec.md` §9's Design Notes).
    pub fn new() -> Self {
        Self {
            tools: vec![
                Box::new(filesystem::ListDirTool),
                Box::new(filesystem::ReadFileTool),
                Box::new(filesystem::ReadManyTool),
                Box::new(filesystem::WriteFileTool),
                Box::new(filesystem::DeletePathTool),
                Box::new(filesystem::ReplaceInFileTool),
                Box::new(requirements_tools::GetAllRequirementsTool),
                Box::new(requirements_tools::GetAllRequirementIdsTool),
                Box::new(requirements_tools::GetRequirementDataTool),
                Box::new(requirements_tools::EndConversationTool),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().map(|t| t.as_ref()).find(|t| t.name() == name)
    }

    pub fn specs(&self) -> Vec<lift_provider::ToolSpec> {
        self.tools
            .iter()
            .map(|t| lift_provider::ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    pub async fn dispatch(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<Value, UnknownTool> {
        match self.get(name) {
            Some(tool) => {
                tracing::info!(tool = name, "tool call");
                let result = tool.execute(args, ctx).await;
                tracing::info!(tool = name, "tool result");
                Ok(result)
            }
            None => Err(UnknownTool(name.to_string())),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_exposes_exactly_the_ten_spec_tools() {
        let registry = ToolRegistry::new();
        let mut names: Vec<&str> = registry.tools.iter().map(|t| t.name()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "delete_path",
                "end_conversation",
                "get_all_requirement_ids",
                "get_all_requirements",
                "get_requirement_data",
                "list_dir",
                "read_file",
                "read_many",
                "replace_in_file",
                "write_file",
            ]
        );
    }

    #[tokio::test]
    async fn unknown_tool_dispatch_fails() {
        let registry = ToolRegistry::new();
        let ctx = ToolContext {
            root: PathBuf::from("/tmp"),
            requirements: Arc::new(RequirementScope {
                title: "root".into(),
                children: crate::requirements::ScopeChildren::Requirements(vec![]),
            }),
        };
        let err = registry.dispatch("does_not_exist", Value::Null, &ctx).await.unwrap_err();
        assert_eq!(err, UnknownTool("does_not_exist".to_string()));
    }
}
