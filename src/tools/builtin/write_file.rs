//! write_file tool - create or overwrite a file

use async_trait::async_trait;
use serde_json::Value;

use crate::exec::ExecEnv;
use crate::tools::{Tool, ToolResult};

/// Write content to a file, creating parent directories as needed
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file, overwriting if it exists. Creates parent directories."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the working directory"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: Value, env: &dyn ExecEnv) -> ToolResult {
        let path = match input["path"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("path is required"),
        };
        let content = match input["content"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("content is required"),
        };

        match env.write(path, content).await {
            Ok(()) => ToolResult::success(format!("Wrote {} bytes to {}", content.len(), path)),
            Err(e) => ToolResult::error(format!("Failed to write file: {}", e)),
        }
    }
}
