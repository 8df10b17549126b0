//! Node outcomes - what a handler reports back to the engine

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Terminal status of one node execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Fail,
    PartialSuccess,
    Retry,
}

impl OutcomeStatus {
    /// Status name as written in artifacts and conditions
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Fail => "fail",
            OutcomeStatus::PartialSuccess => "partial_success",
            OutcomeStatus::Retry => "retry",
        }
    }

    /// Parse a status word (condition grammar, STATUS: markers)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "success" => Some(OutcomeStatus::Success),
            "fail" | "failure" | "failed" => Some(OutcomeStatus::Fail),
            "partial_success" | "partialsuccess" | "partial" => Some(OutcomeStatus::PartialSuccess),
            "retry" => Some(OutcomeStatus::Retry),
            _ => None,
        }
    }
}

/// What a handler produced for one node execution
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: OutcomeStatus,

    /// Key/value pairs merged into the pipeline context after the node
    pub context_updates: Option<HashMap<String, String>>,

    /// Free-form notes recorded in status.json
    pub notes: String,

    /// Handler-specific fields spliced into status.json (model, exit_code, ...)
    pub status_extras: HashMap<String, serde_json::Value>,
}

impl Outcome {
    pub fn success() -> Self {
        Self::with_status(OutcomeStatus::Success, String::new())
    }

    pub fn success_with_notes(notes: impl Into<String>) -> Self {
        Self::with_status(OutcomeStatus::Success, notes.into())
    }

    pub fn fail(notes: impl Into<String>) -> Self {
        Self::with_status(OutcomeStatus::Fail, notes.into())
    }

    pub fn partial(notes: impl Into<String>) -> Self {
        Self::with_status(OutcomeStatus::PartialSuccess, notes.into())
    }

    pub fn retry(notes: impl Into<String>) -> Self {
        Self::with_status(OutcomeStatus::Retry, notes.into())
    }

    fn with_status(status: OutcomeStatus, notes: String) -> Self {
        Self {
            status,
            context_updates: None,
            notes,
            status_extras: HashMap::new(),
        }
    }

    /// Add a context update
    pub fn with_update(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_updates
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Add a status.json extra field
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.status_extras.insert(key.into(), value);
        self
    }
}
