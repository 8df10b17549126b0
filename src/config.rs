//! dotflow configuration types and loading

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::SessionConfig;

/// Main dotflow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Engine limits
    pub engine: EngineSettings,

    /// Agent session limits
    pub session: SessionSettings,

    /// Human gate configuration
    pub gates: GateConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.dotflow.yml`, then
    /// `~/.config/dotflow/dotflow.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".dotflow.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dotflow").join("dotflow.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "scripted")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 16384,
            timeout_ms: 300_000,
        }
    }
}

/// Engine limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Node executions allowed per run
    #[serde(rename = "max-steps")]
    pub max_steps: u32,

    /// Base retry backoff in milliseconds
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Timeout for tool (shell) nodes in milliseconds
    #[serde(rename = "tool-timeout-ms")]
    pub tool_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            retry_backoff_ms: 200,
            tool_timeout_ms: 300_000,
        }
    }
}

/// Agent session limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Max provider calls per session
    #[serde(rename = "max-turns")]
    pub max_turns: u32,

    /// Max tool rounds between an input and the final assistant turn
    #[serde(rename = "max-tool-rounds")]
    pub max_tool_rounds: u32,

    /// Default shell tool timeout in milliseconds
    #[serde(rename = "shell-timeout-ms")]
    pub shell_timeout_ms: u64,

    /// Hard ceiling on shell tool timeouts in milliseconds
    #[serde(rename = "max-shell-timeout-ms")]
    pub max_shell_timeout_ms: u64,

    /// Detect repeating tool-call loops
    #[serde(rename = "loop-detection")]
    pub loop_detection: bool,

    /// Trailing turns the loop detector examines
    #[serde(rename = "loop-detection-window")]
    pub loop_detection_window: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_turns: 50,
            max_tool_rounds: 30,
            shell_timeout_ms: 120_000,
            max_shell_timeout_ms: 600_000,
            loop_detection: true,
            loop_detection_window: 10,
        }
    }
}

impl SessionSettings {
    /// Materialize a session config from these settings
    pub fn to_session_config(&self, max_tokens: u32) -> SessionConfig {
        SessionConfig {
            max_turns: self.max_turns,
            max_tool_rounds_per_input: self.max_tool_rounds,
            max_tokens,
            default_shell_timeout: Duration::from_millis(self.shell_timeout_ms),
            max_shell_timeout: Duration::from_millis(self.max_shell_timeout_ms),
            reasoning_effort: None,
            tool_output_limits: HashMap::new(),
            loop_detection: self.loop_detection,
            loop_detection_window: self.loop_detection_window,
        }
    }
}

/// Human gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Directory gate files are exchanged through
    pub dir: PathBuf,

    /// Answer poll interval in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".dotflow/gates"),
            poll_interval_ms: 2_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.engine.max_steps, 1000);
        assert_eq!(config.session.max_turns, 50);
        assert_eq!(config.gates.poll_interval_ms, 2_000);
    }

    #[test]
    fn test_partial_yaml_overlays_defaults() {
        let yaml = r#"
llm:
  provider: scripted
  model: test-model
session:
  max-turns: 5
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.provider, "scripted");
        assert_eq!(config.llm.max_tokens, 16384); // default survives
        assert_eq!(config.session.max_turns, 5);
        assert!(config.session.loop_detection);
    }

    #[test]
    fn test_to_session_config() {
        let settings = SessionSettings {
            max_turns: 7,
            shell_timeout_ms: 1_000,
            ..Default::default()
        };
        let session = settings.to_session_config(4096);
        assert_eq!(session.max_turns, 7);
        assert_eq!(session.max_tokens, 4096);
        assert_eq!(session.default_shell_timeout, Duration::from_millis(1_000));
    }

    #[test]
    fn test_load_missing_explicit_path_errors() {
        let result = Config::load(Some(&PathBuf::from("/definitely/not/here.yml")));
        assert!(result.is_err());
    }
}
