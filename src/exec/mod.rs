//! Execution environment - the sandboxed surface tools run against
//!
//! Tools never touch the filesystem or spawn processes directly; they go
//! through an [`ExecEnv`]. The local implementation scopes every operation
//! to a working directory, so an agent cannot escape the run's sandbox.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod local;

pub use local::LocalExecEnv;

/// Errors from execution-environment operations
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Path '{path}' escapes the working directory '{root}'")]
    SandboxViolation { path: String, root: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid pattern: {0}")]
    Pattern(String),
}

/// Captured output of a shell invocation
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ShellOutput {
    /// True when the command exited zero
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Sandboxed execution environment consumed by tools
#[async_trait]
pub trait ExecEnv: Send + Sync {
    /// The directory all relative paths resolve against
    fn working_dir(&self) -> &Path;

    /// Read a file as UTF-8 text
    async fn read(&self, path: &str) -> Result<String, EnvError>;

    /// Write a file, creating parent directories as needed
    async fn write(&self, path: &str, content: &str) -> Result<(), EnvError>;

    /// Run a shell command in the working directory
    async fn shell(&self, command: &str, timeout: Duration) -> Result<ShellOutput, EnvError>;

    /// Find files matching a glob pattern, as sorted relative paths
    async fn glob(&self, pattern: &str) -> Result<Vec<String>, EnvError>;

    /// Search file contents; returns `path:line:text` match lines
    async fn grep(&self, pattern: &str, path: &str, max_results: usize) -> Result<Vec<String>, EnvError>;
}
