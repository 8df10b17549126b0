//! Graph model for the pipeline description language
//!
//! A pipeline is described in a permissive subset of the DOT attribute
//! language. The parser in this module produces a [`Graph`] of [`Node`]s and
//! [`Edge`]s with typed attributes; everything the description said is also
//! kept verbatim in per-item attribute bags so handlers can read
//! handler-specific keys (e.g. `command` on tool nodes).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

mod lexer;
mod parser;

pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{ParseError, parse};

/// A node identifier - opaque string, unique within a graph
pub type NodeId = String;

/// A parsed pipeline graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name from the `digraph <name>` header
    pub name: String,

    /// Human-readable label (`label` graph attribute)
    pub label: String,

    /// The goal the pipeline works toward; substituted for `$goal` in prompts
    pub goal: String,

    /// Default retry budget for nodes that don't set `max_retries`
    pub default_max_retries: u32,

    /// Node to route to when a node fails and has no `retry_target` of its own
    pub retry_target: Option<String>,

    /// Last-resort retry target
    pub fallback_retry_target: Option<String>,

    /// Default fidelity hint for LLM nodes
    pub default_fidelity: Option<String>,

    /// Stylesheet mapping node classes to models
    pub model_stylesheet: Option<String>,

    /// Nodes keyed by id
    pub nodes: HashMap<NodeId, Node>,

    /// Node ids in first-declaration order (listings stay deterministic)
    pub node_order: Vec<NodeId>,

    /// Edges in declaration order
    pub edges: Vec<Edge>,

    /// All graph-level attributes as written
    pub attributes: HashMap<String, String>,
}

impl Graph {
    /// Create an empty graph with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set a graph-level attribute, mirroring recognized keys to typed fields
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match key {
            "goal" => self.goal = value.to_string(),
            "label" => self.label = value.to_string(),
            "default_max_retry" | "default_max_retries" => {
                self.default_max_retries = value.parse().unwrap_or(0);
            }
            "retry_target" => self.retry_target = Some(value.to_string()),
            "fallback_retry_target" => self.fallback_retry_target = Some(value.to_string()),
            "default_fidelity" => self.default_fidelity = Some(value.to_string()),
            "model_stylesheet" => self.model_stylesheet = Some(value.to_string()),
            _ => {}
        }
        self.attributes.insert(key.to_string(), value.to_string());
    }

    /// Insert a node, recording declaration order on first sight
    pub fn insert_node(&mut self, node: Node) {
        if !self.nodes.contains_key(&node.id) {
            self.node_order.push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Get a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Outgoing edges of a node, in declaration order
    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == id)
    }

    /// Emit canonical graph-description text
    ///
    /// `parse(g.to_dot())` reconstructs `g` up to attribute ordering.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        if self.name.is_empty() {
            out.push_str("digraph {\n");
        } else {
            out.push_str(&format!("digraph {} {{\n", ident(&self.name)));
        }

        let mut graph_keys: Vec<&String> = self.attributes.keys().collect();
        graph_keys.sort();
        for key in graph_keys {
            out.push_str(&format!("    {} = {};\n", ident(key), quote(&self.attributes[key])));
        }

        for id in &self.node_order {
            let node = &self.nodes[id];
            if node.attributes.is_empty() {
                out.push_str(&format!("    {};\n", ident(id)));
            } else {
                out.push_str(&format!("    {} [{}];\n", ident(id), emit_attrs(&node.attributes)));
            }
        }

        for edge in &self.edges {
            if edge.attributes.is_empty() {
                out.push_str(&format!("    {} -> {};\n", ident(&edge.from), ident(&edge.to)));
            } else {
                out.push_str(&format!(
                    "    {} -> {} [{}];\n",
                    ident(&edge.from),
                    ident(&edge.to),
                    emit_attrs(&edge.attributes)
                ));
            }
        }

        out.push_str("}\n");
        out
    }
}

/// A unit of work in the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Opaque identifier
    pub id: NodeId,

    /// Dispatch tag: which handler runs this node
    pub shape: String,

    /// Display label
    pub label: String,

    /// Prompt template; may reference `$goal` and `${context.<key>}`
    pub prompt: String,

    /// Retry budget override; graph default applies when unset
    pub max_retries: Option<u32>,

    /// Where to route when this node fails under budget
    pub retry_target: Option<String>,

    /// Fallback when the retry target itself is exhausted
    pub fallback_retry_target: Option<String>,

    /// Node gates the overall goal: a hard failure here ends the run
    pub goal_gate: bool,

    /// Downgrade this node's failures to partial success
    pub allow_partial: bool,

    /// Derive outcome status from a trailing STATUS: marker in LLM output
    pub auto_status: bool,

    /// Model override for LLM nodes
    pub llm_model: Option<String>,

    /// Provider override for LLM nodes
    pub llm_provider: Option<String>,

    /// Reasoning effort hint passed to the provider
    pub reasoning_effort: String,

    /// All attributes as written, for handler-specific reads
    pub attributes: HashMap<String, String>,
}

impl Node {
    /// Create a node with default attributes
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            shape: "box".to_string(),
            label: String::new(),
            prompt: String::new(),
            max_retries: None,
            retry_target: None,
            fallback_retry_target: None,
            goal_gate: false,
            allow_partial: false,
            auto_status: false,
            llm_model: None,
            llm_provider: None,
            reasoning_effort: "high".to_string(),
            attributes: HashMap::new(),
        }
    }

    /// Set an attribute, mirroring recognized keys to typed fields
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match key {
            "shape" => self.shape = value.to_string(),
            "label" => self.label = value.to_string(),
            "prompt" => self.prompt = value.to_string(),
            "max_retries" => self.max_retries = Some(value.parse().unwrap_or(0)),
            "retry_target" => self.retry_target = Some(value.to_string()),
            "fallback_retry_target" => self.fallback_retry_target = Some(value.to_string()),
            "goal_gate" => self.goal_gate = is_true(value),
            "allow_partial" => self.allow_partial = is_true(value),
            "auto_status" => self.auto_status = is_true(value),
            "llm_model" => self.llm_model = Some(value.to_string()),
            "llm_provider" => self.llm_provider = Some(value.to_string()),
            "reasoning_effort" => self.reasoning_effort = value.to_string(),
            _ => {}
        }
        self.attributes.insert(key.to_string(), value.to_string());
    }

    /// Raw attribute lookup (handler-specific keys like `command`)
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A directed edge between two nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,

    /// Predicate evaluated against the source node's outcome and the context
    pub condition: Option<String>,

    /// Display label, also visible to conditions
    pub label: Option<String>,

    /// Priority weight; ties break on declaration order
    pub weight: i64,

    /// Following this edge resets the target's retry counter
    pub loop_restart: bool,

    /// All attributes as written
    pub attributes: HashMap<String, String>,
}

impl Edge {
    /// Create an edge between two node ids
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    /// Set an attribute, mirroring recognized keys to typed fields
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match key {
            "condition" => self.condition = Some(value.to_string()),
            "label" => self.label = Some(value.to_string()),
            "weight" => self.weight = value.parse().unwrap_or(0),
            "loop_restart" => self.loop_restart = is_true(value),
            _ => {}
        }
        self.attributes.insert(key.to_string(), value.to_string());
    }
}

fn is_true(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

fn emit_attrs(attrs: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = attrs.keys().collect();
    keys.sort();
    keys.iter()
        .map(|k| format!("{}={}", ident(k), quote(&attrs[*k])))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Emit a name bare when it lexes as an identifier, quoted otherwise
fn ident(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !matches!(name, "digraph" | "graph" | "node" | "edge" | "subgraph" | "true" | "false");
    if plain { name.to_string() } else { quote(name) }
}

/// Quote a value for emission, escaping quotes, backslashes, and newlines
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
