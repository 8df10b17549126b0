//! Queue interviewer - replays pre-loaded answers (tests, scripted runs)

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Answer, Interviewer, InterviewError, Question};

/// Dequeues one pre-loaded answer per question; fails when empty
pub struct QueueInterviewer {
    answers: Mutex<VecDeque<Answer>>,
}

impl QueueInterviewer {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
        }
    }

    /// Append another answer to the queue
    pub fn push(&self, answer: Answer) {
        self.answers.lock().expect("answers lock").push_back(answer);
    }

    /// Answers left in the queue
    pub fn remaining(&self) -> usize {
        self.answers.lock().expect("answers lock").len()
    }
}

#[async_trait]
impl Interviewer for QueueInterviewer {
    async fn ask(&self, _question: Question) -> Result<Answer, InterviewError> {
        self.answers
            .lock()
            .expect("answers lock")
            .pop_front()
            .ok_or(InterviewError::Exhausted)
    }
}
