//! Callback interviewer - delegate to an arbitrary function

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::{Answer, Interviewer, InterviewError, Question};

type AskFn = dyn Fn(Question) -> BoxFuture<'static, Result<Answer, InterviewError>> + Send + Sync;

/// Wraps a sync or async function as an interviewer
pub struct CallbackInterviewer {
    callback: Box<AskFn>,
}

impl CallbackInterviewer {
    /// Wrap an async function
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Question) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Answer, InterviewError>> + Send + 'static,
    {
        Self {
            callback: Box::new(move |q| Box::pin(f(q))),
        }
    }

    /// Wrap a plain function
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Question) -> Answer + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(move |q| {
                let answer = f(q);
                Box::pin(async move { Ok(answer) })
            }),
        }
    }
}

#[async_trait]
impl Interviewer for CallbackInterviewer {
    async fn ask(&self, question: Question) -> Result<Answer, InterviewError> {
        (self.callback)(question).await
    }
}
