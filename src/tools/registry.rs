//! ToolRegistry - resolves tool names to implementations

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::exec::ExecEnv;
use crate::provider::{ToolCall, ToolDefinition};

use super::builtin::{EditFileTool, GlobTool, GrepTool, ReadFileTool, ShellTool, WriteFileTool};
use super::{Tool, ToolResult};

/// Maps tool names to implementations for one provider profile
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with the standard tool set
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.add_tool(Arc::new(ReadFileTool));
        registry.add_tool(Arc::new(WriteFileTool));
        registry.add_tool(Arc::new(EditFileTool));
        registry.add_tool(Arc::new(ShellTool::default()));
        registry.add_tool(Arc::new(GlobTool));
        registry.add_tool(Arc::new(GrepTool));
        registry
    }

    /// Empty registry (for tests)
    pub fn empty() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Add a tool
    pub fn add_tool(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Tool definitions to advertise to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.input_schema()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool call; unknown names become error results, not panics
    pub async fn execute(&self, call: &ToolCall, env: &dyn ExecEnv) -> ToolResult {
        debug!(tool_name = %call.name, tool_id = %call.id, "ToolRegistry::execute: called");
        match self.tools.get(&call.name) {
            Some(tool) => tool.execute(call.input.clone(), env).await,
            None => ToolResult::error(format!("Unknown tool: {}", call.name)),
        }
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::LocalExecEnv;
    use tempfile::tempdir;

    #[test]
    fn test_standard_registry_has_core_tools() {
        let registry = ToolRegistry::standard();
        for name in ["read_file", "write_file", "edit_file", "shell", "glob", "grep"] {
            assert!(registry.has_tool(name), "missing {}", name);
        }
    }

    #[test]
    fn test_definitions_are_sorted_and_complete() {
        let registry = ToolRegistry::standard();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 6);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let temp = tempdir().unwrap();
        let env = LocalExecEnv::new(temp.path().to_path_buf());
        let registry = ToolRegistry::standard();

        let call = ToolCall {
            id: "c1".to_string(),
            name: "launch_missiles".to_string(),
            input: serde_json::json!({}),
        };
        let result = registry.execute(&call, &env).await;
        assert!(result.is_error);
        assert!(result.content.contains("Unknown tool"));
    }
}
