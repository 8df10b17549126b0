//! grep tool - search file contents with a regex

use async_trait::async_trait;
use serde_json::Value;

use crate::exec::ExecEnv;
use crate::tools::{Tool, ToolResult};

/// Search for a regex pattern in files under the working directory
pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn description(&self) -> &'static str {
        "Search file contents for a regex pattern. Returns path:line:text matches."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search (default: working directory)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum matches to return (default: 100)"
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
        let path = input["path"].as_str().unwrap_or(".");
        let max_results = input["max_results"].as_u64().unwrap_or(100) as usize;

        match env.grep(pattern, path, max_results).await {
            Ok(matches) if matches.is_empty() => ToolResult::success("No matches found"),
            Ok(matches) => ToolResult::success(matches.join("\n")),
            Err(e) => ToolResult::error(format!("Grep failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::LocalExecEnv;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_grep_finds_pattern() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("src.rs"), "fn main() {\n    todo!()\n}").unwrap();
        let env = LocalExecEnv::new(temp.path().to_path_buf());

        let result = GrepTool.execute(serde_json::json!({"pattern": "todo!"}), &env).await;
        assert!(!result.is_error);
        assert!(result.content.contains("src.rs:2:"));
    }

    #[tokio::test]
    async fn test_grep_no_matches() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("src.rs"), "nothing here").unwrap();
        let env = LocalExecEnv::new(temp.path().to_path_buf());

        let result = GrepTool.execute(serde_json::json!({"pattern": "absent"}), &env).await;
        assert!(!result.is_error);
        assert!(result.content.contains("No matches found"));
    }

    #[tokio::test]
    async fn test_grep_invalid_pattern() {
        let temp = tempdir().unwrap();
        let env = LocalExecEnv::new(temp.path().to_path_buf());

        let result = GrepTool.execute(serde_json::json!({"pattern": "(bad"}), &env).await;
        assert!(result.is_error);
    }
}
