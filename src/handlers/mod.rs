//! Node handlers - one per shape tag
//!
//! Dispatch is table-driven: the registry maps a node's `shape` attribute
//! (case-insensitive) to a handler. Registering a new handler is one map
//! insert; there is no inheritance anywhere. Handlers report a
//! [`HandlerKind`] so the engine knows which ones are control-flow markers
//! (start, exit, parallel, fan-in, conditional) rather than units of work.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::{Outcome, PipelineContext};
use crate::graph::{Graph, Node};
use crate::interview::Interviewer;
use crate::provider::Provider;
use crate::session::SessionConfig;

mod codergen;
mod gate;
mod passthrough;
mod tool;

pub use codergen::CodergenHandler;
pub use gate::GateHandler;
pub use passthrough::PassthroughHandler;
pub use tool::ToolNodeHandler;

/// What role a handler plays in the engine's control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Start,
    Exit,
    Codergen,
    Tool,
    Conditional,
    Parallel,
    FanIn,
    Gate,
}

/// Everything the engine hands a node handler for one execution
pub struct HandlerCtx<'a> {
    pub node: &'a Node,

    /// Fully expanded prompt (preamble included for LLM nodes)
    pub prompt: String,

    pub graph: &'a Graph,
    pub context: &'a PipelineContext,

    /// This node's log directory (`logs/<id>/`), already created
    pub node_dir: PathBuf,

    /// The run's working directory (parent of `logs/`)
    pub working_dir: PathBuf,

    pub cancel: CancellationToken,
}

/// A handler for one node shape
#[async_trait]
pub trait NodeHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    async fn run(&self, ctx: HandlerCtx<'_>) -> eyre::Result<Outcome>;
}

/// Dependencies for the standard handler table
pub struct StandardHandlers {
    /// Providers by name; node `llm_provider` attributes select from here
    pub providers: HashMap<String, Arc<dyn Provider>>,
    pub default_provider: String,
    pub default_model: String,
    pub session_config: SessionConfig,
    pub interviewer: Arc<dyn Interviewer>,

    /// Timeout for tool (shell) nodes
    pub tool_timeout: Duration,
}

/// Shape-to-handler table
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The standard table from §shapes: Mdiamond/Msquare/box/parallelogram/
    /// diamond/hexagon/trapezium/cylinder
    pub fn standard(deps: StandardHandlers) -> Self {
        let mut registry = Self::new();
        registry.insert("Mdiamond", Arc::new(PassthroughHandler::new(HandlerKind::Start)));
        registry.insert("Msquare", Arc::new(PassthroughHandler::new(HandlerKind::Exit)));
        registry.insert(
            "box",
            Arc::new(CodergenHandler::new(
                deps.providers,
                deps.default_provider,
                deps.default_model,
                deps.session_config,
            )),
        );
        registry.insert("parallelogram", Arc::new(ToolNodeHandler::new(deps.tool_timeout)));
        registry.insert("diamond", Arc::new(PassthroughHandler::new(HandlerKind::Conditional)));
        registry.insert("hexagon", Arc::new(PassthroughHandler::new(HandlerKind::Parallel)));
        registry.insert("parallel", Arc::new(PassthroughHandler::new(HandlerKind::Parallel)));
        registry.insert("trapezium", Arc::new(PassthroughHandler::new(HandlerKind::FanIn)));
        registry.insert("cylinder", Arc::new(GateHandler::new(deps.interviewer)));
        registry
    }

    /// Register a handler for a shape (case-insensitive)
    pub fn insert(&mut self, shape: &str, handler: Arc<dyn NodeHandler>) {
        self.handlers.insert(shape.to_lowercase(), handler);
    }

    /// Resolve a shape to its handler
    pub fn resolve(&self, shape: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(&shape.to_lowercase()).cloned()
    }

    /// Kind of the handler registered for a shape
    pub fn kind_of(&self, shape: &str) -> Option<HandlerKind> {
        self.resolve(shape).map(|h| h.kind())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::AutoApproveInterviewer;
    use crate::provider::ScriptedProvider;

    fn deps() -> StandardHandlers {
        let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();
        providers.insert("scripted".to_string(), Arc::new(ScriptedProvider::new(vec![])));
        StandardHandlers {
            providers,
            default_provider: "scripted".to_string(),
            default_model: "test-model".to_string(),
            session_config: SessionConfig::default(),
            interviewer: Arc::new(AutoApproveInterviewer),
            tool_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_standard_table_covers_all_shapes() {
        let registry = HandlerRegistry::standard(deps());
        assert_eq!(registry.kind_of("Mdiamond"), Some(HandlerKind::Start));
        assert_eq!(registry.kind_of("Msquare"), Some(HandlerKind::Exit));
        assert_eq!(registry.kind_of("box"), Some(HandlerKind::Codergen));
        assert_eq!(registry.kind_of("parallelogram"), Some(HandlerKind::Tool));
        assert_eq!(registry.kind_of("diamond"), Some(HandlerKind::Conditional));
        assert_eq!(registry.kind_of("hexagon"), Some(HandlerKind::Parallel));
        assert_eq!(registry.kind_of("trapezium"), Some(HandlerKind::FanIn));
        assert_eq!(registry.kind_of("cylinder"), Some(HandlerKind::Gate));
    }

    #[test]
    fn test_resolution_is_case_insensitive() {
        let registry = HandlerRegistry::standard(deps());
        assert_eq!(registry.kind_of("MDIAMOND"), Some(HandlerKind::Start));
        assert_eq!(registry.kind_of("Box"), Some(HandlerKind::Codergen));
    }

    #[test]
    fn test_unregistered_shape_is_none() {
        let registry = HandlerRegistry::standard(deps());
        assert_eq!(registry.kind_of("dodecahedron"), None);
    }
}
