//! Local execution environment rooted at a working directory

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use grep_regex::RegexMatcher;
use grep_searcher::sinks::UTF8;
use grep_searcher::{BinaryDetection, SearcherBuilder};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use super::{EnvError, ExecEnv, ShellOutput};

/// Runs tools against a directory on the local machine
///
/// All file operations are constrained to the working directory unless the
/// sandbox is explicitly disabled. Shell commands run through `sh -c` with
/// the working directory as cwd and honor the cancellation token.
pub struct LocalExecEnv {
    root: PathBuf,
    sandbox_enabled: bool,
    cancel: CancellationToken,
}

impl LocalExecEnv {
    /// Create an environment rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            sandbox_enabled: true,
            cancel: CancellationToken::new(),
        }
    }

    /// Create an environment sharing an external cancellation token
    pub fn with_cancellation(root: PathBuf, cancel: CancellationToken) -> Self {
        Self {
            root,
            sandbox_enabled: true,
            cancel,
        }
    }

    /// Create an environment with the sandbox disabled (tests only)
    pub fn unsandboxed(root: PathBuf) -> Self {
        Self {
            root,
            sandbox_enabled: false,
            cancel: CancellationToken::new(),
        }
    }

    fn normalize(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    /// Resolve a path and enforce the sandbox boundary
    ///
    /// Non-existent paths (new files) are checked through their closest
    /// existing parent so symlinks cannot smuggle writes outside the root.
    fn validate_path(&self, path: &str) -> Result<PathBuf, EnvError> {
        let normalized = self.normalize(path);

        if !self.sandbox_enabled {
            return Ok(normalized);
        }

        let canonical = if normalized.exists() {
            normalized.canonicalize().unwrap_or_else(|_| normalized.clone())
        } else if let Some(parent) = normalized.parent() {
            if parent.exists() {
                let canonical_parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
                canonical_parent.join(normalized.file_name().unwrap_or_default())
            } else {
                normalized.clone()
            }
        } else {
            normalized.clone()
        };

        let root_canonical = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());

        if canonical.starts_with(&root_canonical) {
            Ok(canonical)
        } else {
            Err(EnvError::SandboxViolation {
                path: path.to_string(),
                root: self.root.display().to_string(),
            })
        }
    }
}

#[async_trait]
impl ExecEnv for LocalExecEnv {
    fn working_dir(&self) -> &Path {
        &self.root
    }

    async fn read(&self, path: &str) -> Result<String, EnvError> {
        let full = self.validate_path(path)?;
        Ok(tokio::fs::read_to_string(&full).await?)
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), EnvError> {
        let full = self.validate_path(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        Ok(())
    }

    async fn shell(&self, command: &str, timeout: Duration) -> Result<ShellOutput, EnvError> {
        debug!(%command, ?timeout, "LocalExecEnv::shell: spawning");
        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.root)
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            _ = self.cancel.cancelled() => return Err(EnvError::Cancelled),
            result = tokio::time::timeout(timeout, child) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => return Err(EnvError::Io(e)),
                Err(_) => return Err(EnvError::Timeout(timeout)),
            },
        };

        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn glob(&self, pattern: &str) -> Result<Vec<String>, EnvError> {
        let full_pattern = self.root.join(pattern);
        let pattern_str = full_pattern
            .to_str()
            .ok_or_else(|| EnvError::Pattern("pattern is not valid UTF-8".to_string()))?
            .to_string();
        let root = self.root.clone();

        // glob's walk is synchronous; keep it off the async executor
        let matches = tokio::task::spawn_blocking(move || -> Result<Vec<String>, EnvError> {
            let paths = glob::glob(&pattern_str).map_err(|e| EnvError::Pattern(e.to_string()))?;
            let mut out: Vec<String> = paths
                .filter_map(Result::ok)
                .filter_map(|p| {
                    p.strip_prefix(&root)
                        .map(|rel| rel.display().to_string())
                        .ok()
                })
                .collect();
            out.sort();
            Ok(out)
        })
        .await
        .map_err(|e| EnvError::Io(std::io::Error::other(e)))??;

        Ok(matches)
    }

    async fn grep(&self, pattern: &str, path: &str, max_results: usize) -> Result<Vec<String>, EnvError> {
        let search_root = self.validate_path(path)?;
        let root = self.root.clone();
        let matcher = RegexMatcher::new(pattern).map_err(|e| EnvError::Pattern(e.to_string()))?;

        let matches = tokio::task::spawn_blocking(move || -> Result<Vec<String>, EnvError> {
            let mut searcher = SearcherBuilder::new()
                .binary_detection(BinaryDetection::quit(b'\x00'))
                .line_number(true)
                .build();

            let mut out: Vec<String> = Vec::new();
            let walk = WalkDir::new(&search_root)
                .into_iter()
                .filter_entry(|e| e.file_name() != ".git");

            for entry in walk.filter_map(Result::ok) {
                if out.len() >= max_results {
                    break;
                }
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .display()
                    .to_string();
                let result = searcher.search_path(
                    &matcher,
                    entry.path(),
                    UTF8(|line_num, line| {
                        if out.len() >= max_results {
                            return Ok(false);
                        }
                        out.push(format!("{}:{}:{}", rel, line_num, line.trim_end()));
                        Ok(true)
                    }),
                );
                if let Err(e) = result {
                    debug!(path = %rel, error = %e, "LocalExecEnv::grep: skipping unreadable file");
                }
            }
            Ok(out)
        })
        .await
        .map_err(|e| EnvError::Io(std::io::Error::other(e)))??;

        Ok(matches)
    }
}
