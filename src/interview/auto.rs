//! Auto-approve interviewer - unattended runs

use async_trait::async_trait;

use super::{Answer, Interviewer, InterviewError, Question, QuestionType};

/// Answers without a human: first option, "yes", or empty text
pub struct AutoApproveInterviewer;

#[async_trait]
impl Interviewer for AutoApproveInterviewer {
    async fn ask(&self, question: Question) -> Result<Answer, InterviewError> {
        Ok(match question.question_type {
            QuestionType::SingleSelect | QuestionType::MultiSelect => {
                match question.options.first() {
                    Some(first) => Answer::of(first.clone()),
                    None => Answer {
                        text: String::new(),
                        selected_options: vec![],
                    },
                }
            }
            QuestionType::Confirm => Answer::of("yes"),
            QuestionType::FreeText => Answer {
                text: String::new(),
                selected_options: vec![],
            },
        })
    }
}
