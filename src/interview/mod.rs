//! Human-in-the-loop interviews
//!
//! A gate node pauses the pipeline until someone answers a [`Question`].
//! Where the answer comes from is an [`Interviewer`] implementation detail:
//! the terminal, a pre-loaded queue, a polled gate directory on disk, an
//! arbitrary callback, or nobody at all (auto-approve).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod auto;
mod callback;
mod console;
mod file;
mod queue;

pub use auto::AutoApproveInterviewer;
pub use callback::CallbackInterviewer;
pub use console::ConsoleInterviewer;
pub use file::FileInterviewer;
pub use queue::QueueInterviewer;

/// What kind of answer a question expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    SingleSelect,
    MultiSelect,
    FreeText,
    Confirm,
}

/// A question posed to a human
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// Ordered options for select questions; empty otherwise
    #[serde(default)]
    pub options: Vec<String>,
}

impl Question {
    /// A yes/no confirmation
    pub fn confirm(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            question_type: QuestionType::Confirm,
            options: vec![],
        }
    }

    /// A pick-one question
    pub fn single_select(text: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            text: text.into(),
            question_type: QuestionType::SingleSelect,
            options,
        }
    }

    /// A pick-many question
    pub fn multi_select(text: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            text: text.into(),
            question_type: QuestionType::MultiSelect,
            options,
        }
    }

    /// An open-ended question
    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            question_type: QuestionType::FreeText,
            options: vec![],
        }
    }
}

/// A human's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Canonical answer text
    pub text: String,

    /// Selected option labels, in selection order
    #[serde(default)]
    pub selected_options: Vec<String>,
}

impl Answer {
    /// An answer whose selection is its own text
    pub fn of(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            selected_options: vec![text.clone()],
            text,
        }
    }

    /// True when this reads as an affirmative confirmation
    pub fn is_affirmative(&self) -> bool {
        matches!(
            self.text.trim().to_lowercase().as_str(),
            "y" | "yes" | "1" | "true"
        )
    }
}

/// Errors from asking a question
#[derive(Debug, Error)]
pub enum InterviewError {
    #[error("No queued answers remain")]
    Exhausted,

    #[error("Interview cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed answer: {0}")]
    Json(#[from] serde_json::Error),
}

/// Something that can answer questions
#[async_trait]
pub trait Interviewer: Send + Sync {
    /// Pose a question and wait for the answer
    async fn ask(&self, question: Question) -> Result<Answer, InterviewError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_of_selects_itself() {
        let answer = Answer::of("B");
        assert_eq!(answer.text, "B");
        assert_eq!(answer.selected_options, vec!["B".to_string()]);
    }

    #[test]
    fn test_affirmative_forms() {
        for text in ["y", "yes", "YES", "1", "true", "True"] {
            assert!(Answer::of(text).is_affirmative(), "{} should be affirmative", text);
        }
        for text in ["n", "no", "0", "false", "maybe"] {
            assert!(!Answer::of(text).is_affirmative(), "{} should not be affirmative", text);
        }
    }

    #[test]
    fn test_question_type_serde_names() {
        let q = Question::single_select("pick", vec!["A".to_string()]);
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["type"], "SingleSelect");
        assert_eq!(json["options"][0], "A");
    }

    #[test]
    fn test_answer_missing_selected_options_defaults_empty() {
        let answer: Answer = serde_json::from_str(r#"{"text": "B"}"#).unwrap();
        assert_eq!(answer.text, "B");
        assert!(answer.selected_options.is_empty());
    }
}
