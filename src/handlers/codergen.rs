//! Codergen handler - run an agent session for an LLM node

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::engine::{ConfigError, Outcome, OutcomeStatus, RunCancelled};
use crate::exec::LocalExecEnv;
use crate::provider::{Provider, ProviderProfile};
use crate::session::{AgentSession, SessionConfig, SessionError};

use super::{HandlerCtx, HandlerKind, NodeHandler};

/// Drives one agent session per LLM node and records its artifacts
pub struct CodergenHandler {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
    default_model: String,
    session_config: SessionConfig,
}

impl CodergenHandler {
    pub fn new(
        providers: HashMap<String, Arc<dyn Provider>>,
        default_provider: String,
        default_model: String,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            providers,
            default_provider,
            default_model,
            session_config,
        }
    }

    fn resolve_provider(&self, name: &str) -> eyre::Result<Arc<dyn Provider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError(format!("no provider registered under '{}'", name)).into())
    }
}

#[async_trait]
impl NodeHandler for CodergenHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Codergen
    }

    async fn run(&self, ctx: HandlerCtx<'_>) -> eyre::Result<Outcome> {
        let provider_name = ctx
            .node
            .llm_provider
            .clone()
            .unwrap_or_else(|| self.default_provider.clone());
        let model = ctx.node.llm_model.clone().unwrap_or_else(|| self.default_model.clone());
        let provider = self.resolve_provider(&provider_name)?;

        let profile = ProviderProfile::with_shell_timeouts(
            provider_name.clone(),
            model.clone(),
            self.session_config.default_shell_timeout,
            self.session_config.max_shell_timeout,
        );
        let env = Arc::new(LocalExecEnv::with_cancellation(
            ctx.working_dir.clone(),
            ctx.cancel.clone(),
        ));

        let mut session_config = self.session_config.clone();
        if !ctx.node.reasoning_effort.is_empty() {
            session_config.reasoning_effort = Some(ctx.node.reasoning_effort.clone());
        }

        let mut session =
            AgentSession::with_cancellation(profile, provider, env, session_config, ctx.cancel.clone());
        info!(node_id = %ctx.node.id, session_id = %session.id(), %model, "CodergenHandler: session starting");

        let response = match session.process_input(&ctx.prompt).await {
            Ok(text) => text,
            Err(SessionError::Cancelled) => return Err(RunCancelled.into()),
            Err(e) => return Ok(Outcome::fail(e.to_string())),
        };

        tokio::fs::write(ctx.node_dir.join("response.md"), &response).await?;
        debug!(node_id = %ctx.node.id, response_len = response.len(), "CodergenHandler: session finished");

        let status = if ctx.node.auto_status {
            status_from_response(&response).unwrap_or(OutcomeStatus::Success)
        } else if response.starts_with("[Provider error:") {
            OutcomeStatus::Fail
        } else {
            OutcomeStatus::Success
        };

        let mut outcome = match status {
            OutcomeStatus::Success => Outcome::success_with_notes(response.clone()),
            OutcomeStatus::Fail => Outcome::fail(response.clone()),
            OutcomeStatus::PartialSuccess => Outcome::partial(response.clone()),
            OutcomeStatus::Retry => Outcome::retry(response.clone()),
        };
        outcome = outcome
            .with_update(format!("{}.response", ctx.node.id), response)
            .with_extra("model", json!(model))
            .with_extra("provider", json!(provider_name));
        Ok(outcome)
    }
}

/// Read a trailing `STATUS: <word>` marker from the final assistant text
fn status_from_response(response: &str) -> Option<OutcomeStatus> {
    let last_line = response.lines().rev().find(|l| !l.trim().is_empty())?;
    let status_word = last_line.trim().strip_prefix("STATUS:")?;
    OutcomeStatus::parse(status_word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PipelineContext;
    use crate::graph::{Graph, Node};
    use crate::provider::{CompletionResponse, ScriptedProvider};
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    fn handler_with(responses: Vec<CompletionResponse>) -> CodergenHandler {
        let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();
        providers.insert("scripted".to_string(), Arc::new(ScriptedProvider::new(responses)));
        CodergenHandler::new(
            providers,
            "scripted".to_string(),
            "test-model".to_string(),
            SessionConfig::default(),
        )
    }

    async fn run_node(
        handler: &CodergenHandler,
        node: &Node,
        prompt: &str,
    ) -> (Outcome, std::path::PathBuf, tempfile::TempDir) {
        let temp = tempdir().unwrap();
        let node_dir = temp.path().join("logs").join(&node.id);
        std::fs::create_dir_all(&node_dir).unwrap();
        let graph = Graph::new("g");
        let ctx = PipelineContext::new();
        let outcome = handler
            .run(HandlerCtx {
                node,
                prompt: prompt.to_string(),
                graph: &graph,
                context: &ctx,
                node_dir: node_dir.clone(),
                working_dir: temp.path().to_path_buf(),
                cancel: CancellationToken::new(),
            })
            .await
            .unwrap();
        (outcome, node_dir, temp)
    }

    #[tokio::test]
    async fn test_writes_response_and_publishes_context() {
        let handler = handler_with(vec![CompletionResponse::from_text("all done")]);
        let node = Node::new("impl");

        let (outcome, node_dir, _temp) = run_node(&handler, &node, "do it").await;

        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(
            std::fs::read_to_string(node_dir.join("response.md")).unwrap(),
            "all done"
        );
        assert_eq!(outcome.context_updates.unwrap()["impl.response"], "all done");
        assert_eq!(outcome.status_extras["model"], json!("test-model"));
        assert_eq!(outcome.status_extras["provider"], json!("scripted"));
    }

    #[tokio::test]
    async fn test_auto_status_reads_marker() {
        let handler = handler_with(vec![CompletionResponse::from_text(
            "tried hard but could not finish\nSTATUS: fail",
        )]);
        let mut node = Node::new("impl");
        node.set_attribute("auto_status", "true");

        let (outcome, _, _temp) = run_node(&handler, &node, "do it").await;
        assert_eq!(outcome.status, OutcomeStatus::Fail);
    }

    #[tokio::test]
    async fn test_provider_error_text_fails_node() {
        // Exhausted script produces a provider-error synthetic turn
        let handler = handler_with(vec![]);
        let node = Node::new("impl");

        let (outcome, _, _temp) = run_node(&handler, &node, "do it").await;
        assert_eq!(outcome.status, OutcomeStatus::Fail);
        assert!(outcome.notes.contains("Provider error"));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_config_error() {
        let handler = handler_with(vec![]);
        let mut node = Node::new("impl");
        node.set_attribute("llm_provider", "nonexistent");

        let temp = tempdir().unwrap();
        let node_dir = temp.path().join("logs").join("impl");
        std::fs::create_dir_all(&node_dir).unwrap();
        let graph = Graph::new("g");
        let ctx = PipelineContext::new();
        let result = handler
            .run(HandlerCtx {
                node: &node,
                prompt: "p".to_string(),
                graph: &graph,
                context: &ctx,
                node_dir,
                working_dir: temp.path().to_path_buf(),
                cancel: CancellationToken::new(),
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_status_marker_parsing() {
        assert_eq!(status_from_response("done\nSTATUS: success"), Some(OutcomeStatus::Success));
        assert_eq!(
            status_from_response("half way\nSTATUS: partial\n\n"),
            Some(OutcomeStatus::PartialSuccess)
        );
        assert_eq!(status_from_response("no marker here"), None);
    }
}
