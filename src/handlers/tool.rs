//! Tool node handler - run a shell command as a pipeline stage

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::engine::{Outcome, RunCancelled, expand};
use crate::exec::{EnvError, ExecEnv, LocalExecEnv};

use super::{HandlerCtx, HandlerKind, NodeHandler};

/// Runs the node's `command` attribute through the platform shell
///
/// Captures stdout/stderr into the node's log directory, maps exit 0 to
/// Success, and publishes `<id>.stdout` and `<id>.exit_code` into the
/// pipeline context.
pub struct ToolNodeHandler {
    timeout: Duration,
}

impl ToolNodeHandler {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl NodeHandler for ToolNodeHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Tool
    }

    async fn run(&self, ctx: HandlerCtx<'_>) -> eyre::Result<Outcome> {
        let Some(raw_command) = ctx.node.attr("command").or_else(|| ctx.node.attr("tool")) else {
            return Ok(Outcome::fail("tool node has no command attribute"));
        };
        let command = expand(raw_command, &ctx.graph.goal, ctx.context);

        info!(node_id = %ctx.node.id, %command, "ToolNodeHandler: running");
        let env = LocalExecEnv::with_cancellation(ctx.working_dir.clone(), ctx.cancel.clone());
        let output = match env.shell(&command, self.timeout).await {
            Ok(output) => output,
            Err(EnvError::Cancelled) => return Err(RunCancelled.into()),
            Err(e) => return Ok(Outcome::fail(format!("command failed to run: {}", e))),
        };

        tokio::fs::write(ctx.node_dir.join("stdout.txt"), &output.stdout).await?;
        tokio::fs::write(ctx.node_dir.join("stderr.txt"), &output.stderr).await?;
        debug!(node_id = %ctx.node.id, exit_code = output.exit_code, "ToolNodeHandler: finished");

        let outcome = if output.success() {
            Outcome::success_with_notes("command exited 0")
        } else {
            Outcome::fail(format!("command exited {}", output.exit_code))
        };

        Ok(outcome
            .with_update(format!("{}.stdout", ctx.node.id), output.stdout.trim().to_string())
            .with_update(format!("{}.exit_code", ctx.node.id), output.exit_code.to_string())
            .with_extra("command", json!(command))
            .with_extra("exit_code", json!(output.exit_code)))
    }
}
