//! Provider profile - the per-provider bundle a session runs with
//!
//! A profile carries the model id, the tool schemas advertised to the model,
//! the tool implementations that fulfill them, and the system-prompt builder.

use std::path::Path;
use std::time::Duration;

use crate::tools::ToolRegistry;
use crate::tools::builtin::ShellTool;

use super::ToolDefinition;

/// Bundle of everything provider-specific a session needs
#[derive(Clone)]
pub struct ProviderProfile {
    /// Provider name, recorded in status artifacts
    pub provider_name: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Tool implementations keyed by name
    pub registry: ToolRegistry,
}

impl ProviderProfile {
    /// Standard profile: the six builtin tools with default shell timeouts
    pub fn standard(provider_name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            model: model.into(),
            registry: ToolRegistry::standard(),
        }
    }

    /// Standard profile with explicit shell timeout bounds
    pub fn with_shell_timeouts(
        provider_name: impl Into<String>,
        model: impl Into<String>,
        default_timeout: Duration,
        max_timeout: Duration,
    ) -> Self {
        let mut registry = ToolRegistry::standard();
        registry.add_tool(std::sync::Arc::new(ShellTool::with_timeouts(default_timeout, max_timeout)));
        Self {
            provider_name: provider_name.into(),
            model: model.into(),
            registry,
        }
    }

    /// Tool schemas advertised to the model
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// System prompt for a session working in `working_dir`
    pub fn system_prompt(&self, working_dir: &Path) -> String {
        format!(
            "You are a coding agent executing one stage of an automated pipeline.\n\
             Complete the task you are given using the available tools, then reply\n\
             with a final message summarizing what you did.\n\
             Working directory: {}\n\
             Always use paths relative to the working directory.",
            working_dir.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_standard_profile_advertises_builtin_tools() {
        let profile = ProviderProfile::standard("anthropic", "test-model");
        let names: Vec<String> = profile.tool_definitions().iter().map(|d| d.name.clone()).collect();
        assert_eq!(
            names,
            vec!["edit_file", "glob", "grep", "read_file", "shell", "write_file"]
        );
    }

    #[test]
    fn test_system_prompt_mentions_working_dir() {
        let profile = ProviderProfile::standard("anthropic", "test-model");
        let prompt = profile.system_prompt(&PathBuf::from("/work/run-1"));
        assert!(prompt.contains("/work/run-1"));
        assert!(prompt.contains("relative"));
    }
}
