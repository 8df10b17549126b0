//! shell tool - execute shell commands in the working directory

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::exec::ExecEnv;
use crate::tools::{Tool, ToolResult};

/// Execute a shell command in the working directory
pub struct ShellTool {
    default_timeout: Duration,
    max_timeout: Duration,
}

impl ShellTool {
    /// Shell tool with explicit timeout bounds
    pub fn with_timeouts(default_timeout: Duration, max_timeout: Duration) -> Self {
        Self {
            default_timeout,
            max_timeout,
        }
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(120),
            max_timeout: Duration::from_secs(600),
        }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command in the working directory. Use for builds, tests, and git."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "timeout_ms": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (default: 120000)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, env: &dyn ExecEnv) -> ToolResult {
        let command = match input["command"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("command is required"),
        };

        let timeout = input["timeout_ms"]
            .as_u64()
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout)
            .min(self.max_timeout);

        debug!(%command, ?timeout, "ShellTool::execute: running");
        let output = match env.shell(command, timeout).await {
            Ok(o) => o,
            Err(e) => return ToolResult::error(format!("Failed to execute command: {}", e)),
        };

        let combined = if output.stdout.is_empty() && !output.stderr.is_empty() {
            output.stderr.clone()
        } else if output.stderr.is_empty() {
            output.stdout.clone()
        } else {
            format!("{}\n\nSTDERR:\n{}", output.stdout, output.stderr)
        };

        if output.success() {
            ToolResult::success(combined)
        } else {
            ToolResult::error(format!("Exit code: {}\n{}", output.exit_code, combined))
        }
    }
}
