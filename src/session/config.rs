//! Session configuration

use std::collections::HashMap;
use std::time::Duration;

use super::truncate::OutputLimit;

/// Limits and knobs for one agent session
#[derive(Clone)]
pub struct SessionConfig {
    /// Max provider calls over the session's lifetime
    pub max_turns: u32,

    /// Max tool rounds between a user input and the final assistant turn
    pub max_tool_rounds_per_input: u32,

    /// Max tokens requested per completion
    pub max_tokens: u32,

    /// Shell tool timeout when the model doesn't ask for one
    pub default_shell_timeout: Duration,

    /// Hard ceiling on shell tool timeouts
    pub max_shell_timeout: Duration,

    /// Reasoning effort hint forwarded to the provider
    pub reasoning_effort: Option<String>,

    /// Per-tool output ceiling overrides
    pub tool_output_limits: HashMap<String, OutputLimit>,

    /// Enable repeated-tool-call detection
    pub loop_detection: bool,

    /// How many trailing turns loop detection examines
    pub loop_detection_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: 50,
            max_tool_rounds_per_input: 30,
            max_tokens: 8192,
            default_shell_timeout: Duration::from_secs(120),
            max_shell_timeout: Duration::from_secs(600),
            reasoning_effort: None,
            tool_output_limits: HashMap::new(),
            loop_detection: true,
            loop_detection_window: 10,
        }
    }
}
