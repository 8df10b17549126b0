//! read_file tool - read file contents with line numbers

use async_trait::async_trait;
use serde_json::Value;

use crate::exec::ExecEnv;
use crate::tools::{Tool, ToolResult};

/// Read a file's contents with line numbers
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a file's contents with line numbers. Required before editing."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the working directory"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start reading from (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Max lines to read (default: 2000)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, env: &dyn ExecEnv) -> ToolResult {
        let path = match input["path"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("path is required"),
        };

        let offset = input["offset"].as_u64().unwrap_or(1) as usize;
        let limit = input["limit"].as_u64().unwrap_or(2000) as usize;

        let content = match env.read(path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read file: {}", e)),
        };

        // cat -n style, long lines clipped
        let lines: Vec<String> = content
            .lines()
            .skip(offset.saturating_sub(1))
            .take(limit)
            .enumerate()
            .map(|(i, line)| {
                let line_num = offset + i;
                format!("{:>6}\u{2502}{}", line_num, clip_line(line, 2000))
            })
            .collect();

        ToolResult::success(lines.join("\n"))
    }
}

/// Clip a line to `max_chars` characters, never splitting a character
///
/// Counted in chars, like the session-layer output ceilings - a multibyte
/// character straddling the boundary must not panic the slice.
fn clip_line(line: &str, max_chars: usize) -> String {
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let clipped: String = line.chars().take(max_chars).collect();
    format!("{}...", clipped)
}
