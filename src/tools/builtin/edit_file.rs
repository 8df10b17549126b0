//! edit_file tool - exact-match string replacement in a file

use async_trait::async_trait;
use serde_json::Value;

use crate::exec::ExecEnv;
use crate::tools::{Tool, ToolResult};

/// Replace a specific string in a file
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &'static str {
        "edit_file"
    }

    fn description(&self) -> &'static str {
        "Replace an exact string in a file. The old string must match exactly, including whitespace."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the working directory"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact string to find and replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement string"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, input: Value, env: &dyn ExecEnv) -> ToolResult {
        let path = match input["path"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("path is required"),
        };
        let old_string = match input["old_string"].as_str() {
            Some(s) => s,
            None => return ToolResult::error("old_string is required"),
        };
        let new_string = match input["new_string"].as_str() {
            Some(s) => s,
            None => return ToolResult::error("new_string is required"),
        };
        let replace_all = input["replace_all"].as_bool().unwrap_or(false);

        let content = match env.read(path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read file: {}", e)),
        };

        let count = content.matches(old_string).count();
        if count == 0 {
            return ToolResult::error(
                "old_string not found in file. Make sure it matches exactly including whitespace.",
            );
        }
        if count > 1 && !replace_all {
            return ToolResult::error(format!(
                "old_string appears {} times. Provide more context to make it unique, or set replace_all.",
                count
            ));
        }

        let updated = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };

        match env.write(path, &updated).await {
            Ok(()) => ToolResult::success(format!(
                "Replaced {} occurrence{} in {}",
                count,
                if count == 1 { "" } else { "s" },
                path
            )),
            Err(e) => ToolResult::error(format!("Failed to write file: {}", e)),
        }
    }
}
