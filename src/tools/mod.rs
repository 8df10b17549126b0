//! Tool system for agent sessions
//!
//! Tools are the model-visible surface over the execution environment. Each
//! tool parses its JSON arguments, calls into the [`ExecEnv`](crate::exec::ExecEnv),
//! and renders the result as text. Errors never propagate - they come back
//! as `is_error` results so the model can see them and decide.

mod registry;

pub mod builtin;

pub use registry::ToolRegistry;

use async_trait::async_trait;
use serde_json::Value;

use crate::exec::ExecEnv;

/// A tool that can be called by the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the model's tool_use name)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool against an execution environment
    async fn execute(&self, input: Value, env: &dyn ExecEnv) -> ToolResult;
}

/// Result of a tool execution
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error result
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}
