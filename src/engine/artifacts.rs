//! Run directory layout and status artifacts
//!
//! Every run owns a directory with a `logs/` subtree, one directory per
//! executed node:
//!
//! ```text
//! <run>/logs/<nodeId>/prompt.md     LLM nodes
//! <run>/logs/<nodeId>/response.md   LLM nodes
//! <run>/logs/<nodeId>/stdout.txt    tool nodes
//! <run>/logs/<nodeId>/stderr.txt    tool nodes
//! <run>/logs/<nodeId>/status.json   every executed node
//! ```

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde_json::{Map, Value, json};

use super::outcome::Outcome;

/// Paths of one run's artifact tree
#[derive(Debug, Clone)]
pub struct RunPaths {
    run_dir: PathBuf,
}

impl RunPaths {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self { run_dir: run_dir.into() }
    }

    /// The working directory agents operate in (parent of `logs/`)
    pub fn working_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.run_dir.join("logs")
    }

    /// Log directory for one node
    pub fn node_dir(&self, node_id: &str) -> PathBuf {
        self.logs_dir().join(node_id)
    }

    /// Create the node's log directory
    pub async fn ensure_node_dir(&self, node_id: &str) -> Result<PathBuf> {
        let dir = self.node_dir(node_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .context("Failed to create node log directory")?;
        Ok(dir)
    }

    /// Write `status.json` for a node from its outcome
    pub async fn write_status(&self, node_id: &str, outcome: &Outcome) -> Result<()> {
        let mut record = Map::new();
        record.insert("node_id".to_string(), json!(node_id));
        record.insert("status".to_string(), json!(outcome.status));
        record.insert("notes".to_string(), json!(outcome.notes));
        for (key, value) in &outcome.status_extras {
            record.insert(key.clone(), value.clone());
        }

        let path = self.node_dir(node_id).join("status.json");
        let body = serde_json::to_string_pretty(&Value::Object(record))?;
        tokio::fs::write(&path, body).await.context("Failed to write status.json")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_layout() {
        let temp = tempdir().unwrap();
        let paths = RunPaths::new(temp.path());
        assert_eq!(paths.working_dir(), temp.path());
        assert_eq!(paths.node_dir("build"), temp.path().join("logs").join("build"));
    }

    #[tokio::test]
    async fn test_write_status_includes_extras() {
        let temp = tempdir().unwrap();
        let paths = RunPaths::new(temp.path());
        paths.ensure_node_dir("run_tests").await.unwrap();

        let outcome = Outcome::fail("tests failed")
            .with_extra("command", json!("cargo test"))
            .with_extra("exit_code", json!(101));
        paths.write_status("run_tests", &outcome).await.unwrap();

        let body = std::fs::read_to_string(paths.node_dir("run_tests").join("status.json")).unwrap();
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["node_id"], "run_tests");
        assert_eq!(parsed["status"], "fail");
        assert_eq!(parsed["notes"], "tests failed");
        assert_eq!(parsed["command"], "cargo test");
        assert_eq!(parsed["exit_code"], 101);
    }
}
