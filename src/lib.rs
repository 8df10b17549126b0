//! dotflow - agentic pipeline engine driven by DOT-style graphs
//!
//! A pipeline is a directed graph written in a permissive DOT subset: nodes
//! are units of work (LLM coding agents, shell tools, human approval gates,
//! parallel fan-outs), edges carry routing conditions. The engine parses the
//! graph, walks it from the start node, runs each node through its
//! shape-keyed handler, threads a shared key/value context between nodes,
//! and materializes every node's prompt, output, and status as files under
//! the run directory.
//!
//! # Modules
//!
//! - [`graph`] - graph model, lexer, and parser for the description language
//! - [`engine`] - the scheduler: walk, conditions, retries, parallel barrier
//! - [`handlers`] - shape-to-handler table (start, exit, codergen, tool, ...)
//! - [`session`] - per-node agent loop over an LLM provider with tools
//! - [`provider`] - the `complete(request) -> response` provider contract
//! - [`exec`] - sandboxed execution environment consumed by tools
//! - [`tools`] - the model-visible tool set (read/write/edit/shell/glob/grep)
//! - [`interview`] - human-in-the-loop gates (console, file poll, queue, ...)
//! - [`config`] - YAML configuration with a fallback chain

pub mod cli;
pub mod config;
pub mod engine;
pub mod exec;
pub mod graph;
pub mod handlers;
pub mod interview;
pub mod provider;
pub mod session;
pub mod tools;

// Re-export commonly used types
pub use config::{Config, EngineSettings, GateConfig, LlmConfig, SessionSettings};
pub use engine::{
    ConfigError, EngineConfig, Outcome, OutcomeStatus, PipelineContext, PipelineEngine, RunCancelled, RunPaths,
    RunSummary,
};
pub use exec::{EnvError, ExecEnv, LocalExecEnv, ShellOutput};
pub use graph::{Edge, Graph, Node, ParseError, parse};
pub use handlers::{HandlerKind, HandlerRegistry, NodeHandler, StandardHandlers};
pub use interview::{
    Answer, AutoApproveInterviewer, CallbackInterviewer, ConsoleInterviewer, FileInterviewer, Interviewer,
    InterviewError, Question, QuestionType, QueueInterviewer,
};
pub use provider::{
    AnthropicProvider, CompletionRequest, CompletionResponse, Provider, ProviderError, ProviderProfile,
    ScriptedProvider, ToolCall, ToolDefinition, create_provider,
};
pub use session::{AgentSession, SessionConfig, SessionEvent, SessionHandle, SessionState, Turn};
pub use tools::{Tool, ToolRegistry, ToolResult};
