//! File interviewer - gate directories polled on disk
//!
//! Each question becomes a timestamped gate directory holding
//! `question.json`; a `pending` marker file names the gate currently waiting.
//! An external process (dashboard, chat bridge, a human with an editor)
//! writes `answer.json` into the gate directory and the poll loop picks it
//! up. Writes go through a `.tmp` + rename so a reader never observes
//! partial JSON; reads tolerate partial writes from less careful writers by
//! retrying on the next tick.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Answer, Interviewer, InterviewError, Question};

/// Name of the marker file holding the waiting gate's id
const PENDING_MARKER: &str = "pending";

/// Asks questions by writing gate files and polling for answers
pub struct FileInterviewer {
    gates_dir: PathBuf,
    poll_interval: Duration,
    cancel: CancellationToken,
}

#[derive(Deserialize)]
struct AnswerFile {
    text: String,
    selected_options: Option<Vec<String>>,
}

impl FileInterviewer {
    /// Interviewer over `gates_dir` with the default 2 s poll interval
    pub fn new(gates_dir: PathBuf) -> Self {
        Self {
            gates_dir,
            poll_interval: Duration::from_secs(2),
            cancel: CancellationToken::new(),
        }
    }

    /// Override the poll interval (tests use milliseconds)
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Share an external cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Write a file atomically: `.tmp` then rename
    async fn write_atomic(path: &Path, content: &str) -> Result<(), InterviewError> {
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn remove_pending(&self) {
        let _ = tokio::fs::remove_file(self.gates_dir.join(PENDING_MARKER)).await;
    }
}

#[async_trait]
impl Interviewer for FileInterviewer {
    async fn ask(&self, question: Question) -> Result<Answer, InterviewError> {
        let gate_id = format!("gate-{}", Utc::now().format("%Y%m%dT%H%M%S%3fZ"));
        let gate_dir = self.gates_dir.join(&gate_id);
        tokio::fs::create_dir_all(&gate_dir).await?;

        let question_json = json!({
            "text": question.text,
            "type": question.question_type,
            "options": question.options,
            "gate_id": gate_id,
            "timestamp": Utc::now().to_rfc3339(),
        });
        Self::write_atomic(&gate_dir.join("question.json"), &question_json.to_string()).await?;
        Self::write_atomic(&self.gates_dir.join(PENDING_MARKER), &gate_id).await?;

        info!(%gate_id, "FileInterviewer::ask: gate open, polling for answer");
        let answer_path = gate_dir.join("answer.json");

        loop {
            if self.cancel.is_cancelled() {
                self.remove_pending().await;
                return Err(InterviewError::Cancelled);
            }

            match tokio::fs::read_to_string(&answer_path).await {
                Ok(content) => match serde_json::from_str::<AnswerFile>(&content) {
                    Ok(parsed) => {
                        self.remove_pending().await;
                        let selected_options = parsed
                            .selected_options
                            .unwrap_or_else(|| vec![parsed.text.clone()]);
                        info!(%gate_id, "FileInterviewer::ask: answered");
                        return Ok(Answer {
                            text: parsed.text,
                            selected_options,
                        });
                    }
                    Err(e) => {
                        // Likely a partial write; try again next tick
                        debug!(%gate_id, error = %e, "FileInterviewer::ask: unparseable answer, retrying");
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    debug!(%gate_id, error = %e, "FileInterviewer::ask: read failed, retrying");
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.remove_pending().await;
                    return Err(InterviewError::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
