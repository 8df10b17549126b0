//! Pipeline engine - executes a graph once and materializes a run directory
//!
//! The engine walks the graph from its start node, dispatches each node to
//! the handler registered for its shape, merges context updates, writes the
//! per-node artifacts, and picks the next edge by evaluating conditions in
//! priority order. Failures consult the retry budget and route to the retry
//! target; parallel nodes fork one branch per distinct target and join at
//! the fan-in barrier.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod artifacts;
mod condition;
mod context;
mod outcome;

pub use artifacts::RunPaths;
pub use condition::evaluate;
pub use context::{PipelineContext, expand};
pub use outcome::{Outcome, OutcomeStatus};

use crate::graph::{Edge, Graph};
use crate::handlers::{HandlerCtx, HandlerKind, HandlerRegistry};

/// Fatal misconfiguration: unknown shape, missing provider, no start node
#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

/// Marker error for cooperative cancellation; never converted to a failure
#[derive(Debug, Error)]
#[error("run cancelled")]
pub struct RunCancelled;

/// Engine knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard ceiling on node executions per run (and per parallel branch)
    pub max_steps: u32,

    /// Base delay between a failure and its retry; grows per attempt
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// What a finished run looks like
#[derive(Debug)]
pub struct RunSummary {
    pub status: OutcomeStatus,
    pub notes: String,

    /// Node ids in execution order (branch results in completion order)
    pub visited: Vec<String>,

    /// Final pipeline context
    pub context: PipelineContext,
}

/// Executes one graph into one run directory
pub struct PipelineEngine {
    registry: Arc<HandlerRegistry>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl PipelineEngine {
    pub fn new(registry: Arc<HandlerRegistry>, config: EngineConfig) -> Self {
        Self::with_cancellation(registry, config, CancellationToken::new())
    }

    pub fn with_cancellation(registry: Arc<HandlerRegistry>, config: EngineConfig, cancel: CancellationToken) -> Self {
        Self {
            registry,
            config,
            cancel,
        }
    }

    /// Run the graph, producing artifacts under `run_dir`
    pub async fn run(&self, graph: &Graph, run_dir: &Path) -> eyre::Result<RunSummary> {
        if graph.goal.trim().is_empty() {
            return Err(ConfigError("graph has no goal".to_string()).into());
        }

        let paths = RunPaths::new(run_dir);
        tokio::fs::create_dir_all(paths.logs_dir()).await?;

        let start = self.find_start(graph)?;
        info!(graph = %graph.name, %start, run_dir = %run_dir.display(), "engine: starting run");

        let shared = Arc::new(Shared {
            graph: Arc::new(graph.clone()),
            registry: self.registry.clone(),
            paths,
            cancel: self.cancel.clone(),
            config: self.config.clone(),
        });
        let walker = Walker::new(shared);

        let (walker, result) = walker.run_boxed(start, false).await;
        let end = result?;
        let outcome = match end {
            BranchEnd::Terminal(outcome) => outcome,
            // Unreachable without stop_at_fanin, but harmless to honor
            BranchEnd::AtFanIn { status, .. } => {
                let mut outcome = Outcome::success();
                outcome.status = status;
                outcome
            }
        };

        info!(status = %outcome.status.as_str(), visited = walker.visited.len(), "engine: run finished");
        Ok(RunSummary {
            status: outcome.status,
            notes: outcome.notes,
            visited: walker.visited,
            context: walker.ctx,
        })
    }

    /// The unique node whose shape resolves to the Start kind
    fn find_start(&self, graph: &Graph) -> eyre::Result<String> {
        let starts: Vec<&String> = graph
            .node_order
            .iter()
            .filter(|id| {
                graph
                    .node(id)
                    .and_then(|n| self.registry.kind_of(&n.shape))
                    .map(|k| k == HandlerKind::Start)
                    .unwrap_or(false)
            })
            .collect();
        match starts.as_slice() {
            [only] => Ok((*only).clone()),
            [] => Err(ConfigError("graph has no start node".to_string()).into()),
            many => Err(ConfigError(format!("graph has {} start nodes", many.len())).into()),
        }
    }
}

/// Where a walk stopped
enum BranchEnd {
    /// The walk ended (exit node, dead end, exhausted retries)
    Terminal(Outcome),

    /// The walk reached a fan-in node while inside a parallel branch
    AtFanIn { node_id: String, status: OutcomeStatus },
}

struct Shared {
    graph: Arc<Graph>,
    registry: Arc<HandlerRegistry>,
    paths: RunPaths,
    cancel: CancellationToken,
    config: EngineConfig,
}

/// One walk through the graph - the whole run, or a single parallel branch
struct Walker {
    shared: Arc<Shared>,
    ctx: PipelineContext,

    /// Keys this walk wrote, for ordered merges at parallel barriers
    updates: HashMap<String, String>,

    retries: HashMap<String, u32>,
    visited: Vec<String>,
    steps: u32,
}

impl Walker {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            ctx: PipelineContext::new(),
            updates: HashMap::new(),
            retries: HashMap::new(),
            visited: Vec::new(),
            steps: 0,
        }
    }

    fn branch_of(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            ctx: self.ctx.clone(),
            updates: HashMap::new(),
            retries: HashMap::new(),
            visited: Vec::new(),
            steps: 0,
        }
    }

    /// Boxed entry point so parallel branches can recurse through spawn
    fn run_boxed(mut self, start: String, stop_at_fanin: bool) -> BoxFuture<'static, (Walker, eyre::Result<BranchEnd>)> {
        Box::pin(async move {
            let result = self.walk(start, stop_at_fanin).await;
            (self, result)
        })
    }

    async fn walk(&mut self, start: String, stop_at_fanin: bool) -> eyre::Result<BranchEnd> {
        let shared = self.shared.clone();
        let graph = shared.graph.clone();
        let mut current = start;
        let mut preset: Option<Outcome> = None;

        loop {
            if shared.cancel.is_cancelled() {
                return Err(RunCancelled.into());
            }
            self.steps += 1;
            if self.steps > shared.config.max_steps {
                warn!(max_steps = shared.config.max_steps, "walk: step budget exceeded");
                return Ok(BranchEnd::Terminal(Outcome::fail(format!(
                    "step budget of {} exceeded",
                    shared.config.max_steps
                ))));
            }

            let Some(node) = graph.node(&current) else {
                return Ok(BranchEnd::Terminal(Outcome::fail(format!(
                    "edge points at unknown node '{}'",
                    current
                ))));
            };
            let handler = shared.registry.resolve(&node.shape).ok_or_else(|| {
                ConfigError(format!(
                    "no handler registered for shape '{}' (node '{}')",
                    node.shape, node.id
                ))
            })?;
            let kind = handler.kind();

            if kind == HandlerKind::FanIn
                && stop_at_fanin
                && preset.is_none()
            {
                debug!(node_id = %current, "walk: branch reached fan-in");
                return Ok(BranchEnd::AtFanIn {
                    node_id: current,
                    status: OutcomeStatus::Success,
                });
            }

            debug!(node_id = %current, shape = %node.shape, ?kind, step = self.steps, "walk: executing node");
            self.visited.push(current.clone());
            let node_dir = shared.paths.ensure_node_dir(&current).await?;

            let mut outcome = match preset.take() {
                Some(preset_outcome) => preset_outcome,
                None => {
                    let expanded = expand(&node.prompt, &graph.goal, &self.ctx);
                    let prompt = if kind == HandlerKind::Codergen {
                        let full = format!("{}\n\n{}", self.preamble(), expanded);
                        tokio::fs::write(node_dir.join("prompt.md"), &full).await?;
                        full
                    } else {
                        expanded
                    };

                    let result = handler
                        .run(HandlerCtx {
                            node,
                            prompt,
                            graph: graph.as_ref(),
                            context: &self.ctx,
                            node_dir: node_dir.clone(),
                            working_dir: shared.paths.working_dir().to_path_buf(),
                            cancel: shared.cancel.clone(),
                        })
                        .await;
                    match result {
                        Ok(outcome) => outcome,
                        Err(e)
                            if e.downcast_ref::<ConfigError>().is_some()
                                || e.downcast_ref::<RunCancelled>().is_some() =>
                        {
                            return Err(e);
                        }
                        Err(e) => {
                            warn!(node_id = %current, error = %e, "walk: handler error, converting to failure");
                            Outcome::fail(e.to_string())
                        }
                    }
                }
            };

            if node.allow_partial && outcome.status == OutcomeStatus::Fail {
                debug!(node_id = %current, "walk: downgrading failure to partial success");
                outcome.status = OutcomeStatus::PartialSuccess;
            }

            if let Some(updates) = outcome.context_updates.clone() {
                self.apply_updates(&updates);
            }
            shared.paths.write_status(&current, &outcome).await?;

            match kind {
                HandlerKind::Exit => return Ok(BranchEnd::Terminal(outcome)),
                HandlerKind::Parallel => {
                    let (combined, join) = self.run_parallel(&current).await?;
                    match join {
                        Some(join_id) => {
                            preset = Some(combined);
                            current = join_id;
                            continue;
                        }
                        None => return Ok(BranchEnd::Terminal(combined)),
                    }
                }
                _ => {}
            }

            match outcome.status {
                OutcomeStatus::Success | OutcomeStatus::PartialSuccess => {
                    match self.select_edge(&graph, &current, outcome.status) {
                        Some(edge) => {
                            if edge.loop_restart {
                                debug!(target = %edge.to, "walk: loop restart, clearing retry counter");
                                self.retries.remove(&edge.to);
                            }
                            current = edge.to;
                        }
                        None => return Ok(BranchEnd::Terminal(outcome)),
                    }
                }
                OutcomeStatus::Fail | OutcomeStatus::Retry => {
                    if node.goal_gate {
                        // A failed goal gate ends the run; retrying cannot
                        // un-fail the goal it guards
                        info!(node_id = %current, "walk: goal gate failed, terminating");
                        outcome.status = OutcomeStatus::Fail;
                        return Ok(BranchEnd::Terminal(outcome));
                    }
                    let budget = node.max_retries.unwrap_or(graph.default_max_retries);
                    let count = self.retries.entry(current.clone()).or_insert(0);
                    if *count < budget {
                        *count += 1;
                        let attempt = *count;
                        let target = node
                            .retry_target
                            .clone()
                            .or_else(|| graph.retry_target.clone())
                            .or_else(|| graph.fallback_retry_target.clone())
                            .unwrap_or_else(|| current.clone());
                        info!(node_id = %current, attempt, budget, %target, "walk: retrying");
                        self.backoff(attempt).await?;
                        current = target;
                    } else {
                        // goal_gate or not, an exhausted budget ends the run
                        info!(node_id = %current, budget, "walk: retry budget exhausted");
                        outcome.status = OutcomeStatus::Fail;
                        return Ok(BranchEnd::Terminal(outcome));
                    }
                }
            }
        }
    }

    /// Fork one branch per distinct target, await the barrier, combine
    async fn run_parallel(&mut self, node_id: &str) -> eyre::Result<(Outcome, Option<String>)> {
        let graph = self.shared.graph.clone();
        let mut targets: Vec<String> = Vec::new();
        for edge in graph.outgoing(node_id) {
            if !targets.contains(&edge.to) {
                targets.push(edge.to.clone());
            }
        }
        if targets.is_empty() {
            return Ok((Outcome::fail("parallel node has no outgoing edges"), None));
        }

        info!(node_id = %node_id, branches = targets.len(), "run_parallel: forking");
        let mut branches = FuturesUnordered::new();
        for target in targets {
            branches.push(tokio::spawn(self.branch_of().run_boxed(target, true)));
        }

        let mut statuses: Vec<OutcomeStatus> = Vec::new();
        let mut join_id: Option<String> = None;
        while let Some(joined) = branches.next().await {
            let (branch, result) = joined.map_err(|e| eyre::eyre!("parallel branch panicked: {}", e))?;
            let end = result?;

            // Branch updates merge in completion order; later writes win
            self.apply_updates(&branch.updates);
            self.visited.extend(branch.visited);

            match end {
                BranchEnd::Terminal(outcome) => statuses.push(outcome.status),
                BranchEnd::AtFanIn { node_id, status } => {
                    statuses.push(status);
                    join_id.get_or_insert(node_id);
                }
            }
        }

        let combined = if statuses.iter().all(|s| *s == OutcomeStatus::Success) {
            Outcome::success_with_notes("all branches succeeded")
        } else if statuses.iter().any(|s| *s == OutcomeStatus::Fail) {
            Outcome::fail("a parallel branch failed")
        } else {
            Outcome::partial("parallel branches partially succeeded")
        };
        debug!(node_id = %node_id, status = combined.status.as_str(), ?join_id, "run_parallel: barrier complete");
        Ok((combined, join_id))
    }

    /// First truthy edge, higher weights first, declaration order on ties
    fn select_edge(&self, graph: &Graph, node_id: &str, status: OutcomeStatus) -> Option<Edge> {
        let mut candidates: Vec<&Edge> = graph.outgoing(node_id).collect();
        candidates.sort_by_key(|e| std::cmp::Reverse(e.weight));

        for edge in candidates {
            let truthy = match &edge.condition {
                None => true,
                Some(condition) => evaluate(condition, status, &self.ctx, edge.label.as_deref()),
            };
            if truthy {
                debug!(from = %edge.from, to = %edge.to, "select_edge: taking edge");
                return Some(edge.clone());
            }
        }
        None
    }

    fn apply_updates(&mut self, updates: &HashMap<String, String>) {
        self.ctx.merge(updates);
        for (key, value) in updates {
            self.updates.insert(key.clone(), value.clone());
        }
    }

    /// Jittered, bounded delay before a retry
    async fn backoff(&self, attempt: u32) -> eyre::Result<()> {
        use rand::Rng;

        let base = self.shared.config.retry_backoff;
        let scaled = base.saturating_mul(1 << attempt.min(5)).min(Duration::from_secs(5));
        let jitter = Duration::from_millis(rand::rng().random_range(0..=scaled.as_millis() as u64 / 2));
        let delay = scaled + jitter;
        debug!(?delay, attempt, "backoff: sleeping before retry");

        tokio::select! {
            _ = self.shared.cancel.cancelled() => Err(RunCancelled.into()),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Deterministic header prepended to every LLM prompt
    fn preamble(&self) -> String {
        let graph = &self.shared.graph;
        let name = if graph.name.is_empty() { "pipeline" } else { &graph.name };

        let mut out = String::new();
        out.push_str(&format!("## Pipeline: {}\n\n", name));
        out.push_str(&format!(
            "Working directory: {}\n",
            self.shared.paths.working_dir().display()
        ));
        out.push_str("Stage logs live under logs/, one directory per node:\n");
        for id in &graph.node_order {
            let node = &graph.nodes[id];
            // Terminal and gate stages have no logs worth pointing at
            if matches!(
                self.shared.registry.kind_of(&node.shape),
                Some(HandlerKind::Exit) | Some(HandlerKind::Gate)
            ) {
                continue;
            }
            let marker = if self.shared.paths.node_dir(id).exists() {
                "(exists)"
            } else {
                "(not yet created)"
            };
            out.push_str(&format!("- {}: logs/{}/ {}\n", id, id, marker));
        }
        out.push_str("\nUse relative paths only when reading or writing files.");
        out
    }
}
