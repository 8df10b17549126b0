//! Human gate handler - pause the pipeline for an answer

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::engine::{Outcome, RunCancelled};
use crate::interview::{Interviewer, InterviewError, Question};

use super::{HandlerCtx, HandlerKind, NodeHandler};

/// Delegates the node's question to an interviewer
///
/// The node's expanded prompt is the question text. A comma-separated
/// `options` attribute makes it a SingleSelect; without options it is a
/// Confirm, and a declined confirmation fails the node. The answer is
/// published as `<id>.answer`.
pub struct GateHandler {
    interviewer: Arc<dyn Interviewer>,
}

impl GateHandler {
    pub fn new(interviewer: Arc<dyn Interviewer>) -> Self {
        Self { interviewer }
    }
}

#[async_trait]
impl NodeHandler for GateHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Gate
    }

    async fn run(&self, ctx: HandlerCtx<'_>) -> eyre::Result<Outcome> {
        let text = if ctx.prompt.is_empty() {
            format!("Approve stage '{}'?", ctx.node.id)
        } else {
            ctx.prompt.clone()
        };

        let question = match ctx.node.attr("options") {
            Some(options) => Question::single_select(
                text,
                options.split(',').map(|o| o.trim().to_string()).collect(),
            ),
            None => Question::confirm(text),
        };
        let is_confirm = question.options.is_empty();

        info!(node_id = %ctx.node.id, "GateHandler: waiting for answer");
        let answer = match self.interviewer.ask(question).await {
            Ok(answer) => answer,
            Err(InterviewError::Cancelled) => return Err(RunCancelled.into()),
            Err(e) => return Ok(Outcome::fail(format!("gate failed: {}", e))),
        };

        let outcome = if is_confirm && !answer.is_affirmative() {
            Outcome::fail(format!("declined: {}", answer.text))
        } else {
            Outcome::success_with_notes(answer.text.clone())
        };
        Ok(outcome.with_update(format!("{}.answer", ctx.node.id), answer.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{OutcomeStatus, PipelineContext};
    use crate::graph::{Graph, Node};
    use crate::interview::{Answer, QueueInterviewer};
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    async fn run_gate(node: &Node, answers: Vec<Answer>) -> Outcome {
        let temp = tempdir().unwrap();
        let node_dir = temp.path().join("logs").join(&node.id);
        std::fs::create_dir_all(&node_dir).unwrap();
        let graph = Graph::new("g");
        let ctx = PipelineContext::new();
        let handler = GateHandler::new(Arc::new(QueueInterviewer::new(answers)));
        handler
            .run(HandlerCtx {
                node,
                prompt: "Ship it?".to_string(),
                graph: &graph,
                context: &ctx,
                node_dir,
                working_dir: temp.path().to_path_buf(),
                cancel: CancellationToken::new(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_confirm_yes_succeeds() {
        let node = Node::new("approve");
        let outcome = run_gate(&node, vec![Answer::of("yes")]).await;
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.context_updates.unwrap()["approve.answer"], "yes");
    }

    #[tokio::test]
    async fn test_confirm_no_fails() {
        let node = Node::new("approve");
        let outcome = run_gate(&node, vec![Answer::of("no")]).await;
        assert_eq!(outcome.status, OutcomeStatus::Fail);
    }

    #[tokio::test]
    async fn test_options_attribute_becomes_single_select() {
        let mut node = Node::new("pick");
        node.set_attribute("options", "ship, hold, rollback");
        let outcome = run_gate(&node, vec![Answer::of("hold")]).await;
        // Any selection is a success
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.context_updates.unwrap()["pick.answer"], "hold");
    }

    #[tokio::test]
    async fn test_exhausted_interviewer_fails_gate() {
        let node = Node::new("approve");
        let outcome = run_gate(&node, vec![]).await;
        assert_eq!(outcome.status, OutcomeStatus::Fail);
        assert!(outcome.notes.contains("gate failed"));
    }
}
