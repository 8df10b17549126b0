//! glob tool - find files matching a pattern

use async_trait::async_trait;
use serde_json::Value;

use crate::exec::ExecEnv;
use crate::tools::{Tool, ToolResult};

/// Find files matching a glob pattern
pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn description(&self) -> &'static str {
        "Find files matching a glob pattern (e.g. **/*.rs), relative to the working directory."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: Value, env: &dyn ExecEnv) -> ToolResult {
        let pattern = match input["pattern"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("pattern is required"),
        };

        match env.glob(pattern).await {
            Ok(matches) if matches.is_empty() => ToolResult::success("No files matched"),
            Ok(matches) => ToolResult::success(matches.join("\n")),
            Err(e) => ToolResult::error(format!("Glob failed: {}", e)),
        }
    }
}
