//! Recursive-descent parser for the graph-description language
//!
//! The grammar is deliberately permissive: identifiers, quoted strings, and
//! numbers are interchangeable wherever a name or value is expected,
//! statement separators are optional, and unknown attributes are carried
//! through in raw form. The parser is strict only about structure - an
//! unexpected token or an unterminated brace block is a fatal error with the
//! offending line and column.

use thiserror::Error;
use tracing::debug;

use super::lexer::{Token, TokenKind, tokenize};
use super::{Edge, Graph, Node};

/// A fatal parse error with source position
#[derive(Debug, Error)]
#[error("parse error at {line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Parse graph-description text into a [`Graph`]
pub fn parse(source: &str) -> Result<Graph, ParseError> {
    let tokens = tokenize(source);
    debug!(token_count = tokens.len(), "parse: tokenized");
    Parser { tokens, pos: 0 }.parse_graph()
}

/// Cascading attribute defaults for one scope (graph body or subgraph)
#[derive(Debug, Clone, Default)]
struct Defaults {
    node: Vec<(String, String)>,
    edge: Vec<(String, String)>,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: token.line,
            column: token.column,
        }
    }

    fn unexpected(&self, context: &str) -> ParseError {
        let token = self.peek().clone();
        self.error_at(&token, format!("unexpected {} {}", token.kind.describe(), context))
    }

    /// Consume a token usable as a name or attribute value
    fn expect_value(&mut self, context: &str) -> Result<String, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Identifier(s) => Ok(s),
            TokenKind::QuotedString(s) => Ok(s),
            TokenKind::Number(s) => Ok(s),
            TokenKind::Boolean(b) => Ok(b.to_string()),
            _ => Err(self.error_at(&token, format!("expected {} but found {}", context, token.kind.describe()))),
        }
    }

    fn parse_graph(&mut self) -> Result<Graph, ParseError> {
        let token = self.advance();
        if token.kind != TokenKind::Digraph {
            return Err(self.error_at(&token, format!("expected 'digraph' but found {}", token.kind.describe())));
        }

        let name = if matches!(
            self.peek().kind,
            TokenKind::Identifier(_) | TokenKind::QuotedString(_) | TokenKind::Number(_)
        ) {
            self.expect_value("graph name")?
        } else {
            String::new()
        };

        let token = self.advance();
        if token.kind != TokenKind::LBrace {
            return Err(self.error_at(&token, format!("expected '{{' but found {}", token.kind.describe())));
        }

        let mut graph = Graph::new(name);
        let mut defaults = Defaults::default();
        self.parse_statements(&mut graph, &mut defaults)?;

        debug!(
            name = %graph.name,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "parse_graph: complete"
        );
        Ok(graph)
    }

    /// Parse statements until the closing brace of the current block
    fn parse_statements(&mut self, graph: &mut Graph, defaults: &mut Defaults) -> Result<(), ParseError> {
        loop {
            // Clone the lookahead so the arms are free to advance
            let kind = self.peek().kind.clone();
            match kind {
                TokenKind::RBrace => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::Eof => {
                    return Err(self.unexpected("(unterminated brace block)"));
                }
                TokenKind::Semicolon | TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::Node => {
                    self.advance();
                    let attrs = self.parse_attr_list_opt()?;
                    defaults.node.extend(attrs);
                }
                TokenKind::Edge => {
                    self.advance();
                    let attrs = self.parse_attr_list_opt()?;
                    defaults.edge.extend(attrs);
                }
                TokenKind::Graph => {
                    self.advance();
                    for (key, value) in self.parse_attr_list_opt()? {
                        graph.set_attribute(&key, &value);
                    }
                }
                TokenKind::Subgraph => {
                    self.advance();
                    // Optional subgraph name; discarded - nodes share the
                    // graph's flat namespace
                    if matches!(
                        self.peek().kind,
                        TokenKind::Identifier(_) | TokenKind::QuotedString(_) | TokenKind::Number(_)
                    ) {
                        self.advance();
                    }
                    let token = self.advance();
                    if token.kind != TokenKind::LBrace {
                        return Err(
                            self.error_at(&token, format!("expected '{{' but found {}", token.kind.describe()))
                        );
                    }
                    // Defaults set inside the subgraph do not leak outward
                    let mut inner = defaults.clone();
                    self.parse_statements(graph, &mut inner)?;
                }
                TokenKind::Identifier(_) | TokenKind::QuotedString(_) | TokenKind::Number(_) => {
                    self.parse_ident_statement(graph, defaults)?;
                }
                _ => return Err(self.unexpected("in graph body")),
            }
        }
    }

    /// A statement starting with a name: graph attribute, edge chain, or node
    fn parse_ident_statement(&mut self, graph: &mut Graph, defaults: &Defaults) -> Result<(), ParseError> {
        let first = self.expect_value("name")?;

        let kind = self.peek().kind.clone();
        match kind {
            TokenKind::Equals => {
                self.advance();
                let value = self.expect_value("attribute value")?;
                graph.set_attribute(&first, &value);
            }
            TokenKind::Arrow => {
                let mut chain = vec![first];
                while self.peek().kind == TokenKind::Arrow {
                    self.advance();
                    chain.push(self.expect_value("edge target")?);
                }
                let attrs = self.parse_attr_list_opt()?;

                for id in &chain {
                    self.ensure_node(graph, id, defaults);
                }
                for pair in chain.windows(2) {
                    let mut edge = Edge::new(pair[0].clone(), pair[1].clone());
                    for (key, value) in &defaults.edge {
                        edge.set_attribute(key, value);
                    }
                    for (key, value) in &attrs {
                        edge.set_attribute(key, value);
                    }
                    graph.edges.push(edge);
                }
            }
            _ => {
                let attrs = self.parse_attr_list_opt()?;
                self.ensure_node(graph, &first, defaults);
                let node = graph.nodes.get_mut(&first).expect("node just ensured");
                for (key, value) in &attrs {
                    node.set_attribute(key, value);
                }
            }
        }
        Ok(())
    }

    /// Create a node with the current defaults if it doesn't exist yet
    fn ensure_node(&self, graph: &mut Graph, id: &str, defaults: &Defaults) {
        if graph.nodes.contains_key(id) {
            return;
        }
        let mut node = Node::new(id);
        for (key, value) in &defaults.node {
            node.set_attribute(key, value);
        }
        graph.insert_node(node);
    }

    /// Parse `[ key = value, ... ]` if present; separators optional
    fn parse_attr_list_opt(&mut self) -> Result<Vec<(String, String)>, ParseError> {
        if self.peek().kind != TokenKind::LBracket {
            return Ok(Vec::new());
        }
        self.advance();

        let mut attrs = Vec::new();
        loop {
            let kind = self.peek().kind.clone();
            match kind {
                TokenKind::RBracket => {
                    self.advance();
                    return Ok(attrs);
                }
                TokenKind::Comma | TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::Eof => return Err(self.unexpected("(unterminated attribute list)")),
                _ => {
                    let key = self.expect_value("attribute name")?;
                    let token = self.advance();
                    if token.kind != TokenKind::Equals {
                        return Err(
                            self.error_at(&token, format!("expected '=' but found {}", token.kind.describe()))
                        );
                    }
                    let value = self.expect_value("attribute value")?;
                    attrs.push((key, value));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_graph() {
        let graph = parse("digraph G {}").unwrap();
        assert_eq!(graph.name, "G");
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_anonymous_graph() {
        let graph = parse("digraph { a }").unwrap();
        assert_eq!(graph.name, "");
        assert!(graph.nodes.contains_key("a"));
    }

    #[test]
    fn test_graph_attributes_mirror() {
        let graph = parse(r#"digraph G { goal = "build X"; default_max_retry = 3; fidelity = raw }"#).unwrap();
        assert_eq!(graph.goal, "build X");
        assert_eq!(graph.default_max_retries, 3);
        assert_eq!(graph.attributes.get("fidelity").map(String::as_str), Some("raw"));
    }

    #[test]
    fn test_graph_keyword_attr_list() {
        let graph = parse(r#"digraph G { graph [goal="ship", label="pipeline"] }"#).unwrap();
        assert_eq!(graph.goal, "ship");
        assert_eq!(graph.label, "pipeline");
    }

    #[test]
    fn test_node_declaration_with_attrs() {
        let graph = parse(r#"digraph G { build [shape=box, prompt="do $goal", max_retries=2] }"#).unwrap();
        let node = &graph.nodes["build"];
        assert_eq!(node.shape, "box");
        assert_eq!(node.prompt, "do $goal");
        assert_eq!(node.max_retries, Some(2));
    }

    #[test]
    fn test_edge_chain_produces_pairwise_edges() {
        let graph = parse(r#"digraph G { a -> b -> c [label="x"] }"#).unwrap();
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].from, "a");
        assert_eq!(graph.edges[0].to, "b");
        assert_eq!(graph.edges[1].from, "b");
        assert_eq!(graph.edges[1].to, "c");
        assert_eq!(graph.edges[0].label.as_deref(), Some("x"));
        assert_eq!(graph.edges[1].label.as_deref(), Some("x"));
        // Endpoints synthesized even though never declared
        assert!(graph.nodes.contains_key("a"));
        assert!(graph.nodes.contains_key("b"));
        assert!(graph.nodes.contains_key("c"));
    }

    #[test]
    fn test_cascading_node_defaults() {
        let graph = parse(
            r#"digraph G {
                node [shape=box, reasoning_effort=low]
                a
                b [shape=hexagon]
            }"#,
        )
        .unwrap();
        assert_eq!(graph.nodes["a"].shape, "box");
        assert_eq!(graph.nodes["a"].reasoning_effort, "low");
        // Inline wins over defaults
        assert_eq!(graph.nodes["b"].shape, "hexagon");
        assert_eq!(graph.nodes["b"].reasoning_effort, "low");
    }

    #[test]
    fn test_cascading_edge_defaults() {
        let graph = parse(
            r#"digraph G {
                edge [weight=2]
                a -> b
                c -> d [weight=9]
            }"#,
        )
        .unwrap();
        assert_eq!(graph.edges[0].weight, 2);
        assert_eq!(graph.edges[1].weight, 9);
    }

    #[test]
    fn test_subgraph_defaults_do_not_leak() {
        let graph = parse(
            r#"digraph G {
                node [shape=box]
                subgraph cluster_a {
                    node [shape=hexagon]
                    inner
                }
                outer
            }"#,
        )
        .unwrap();
        assert_eq!(graph.nodes["inner"].shape, "hexagon");
        assert_eq!(graph.nodes["outer"].shape, "box");
    }

    #[test]
    fn test_subgraph_inherits_outer_defaults() {
        let graph = parse(
            r#"digraph G {
                node [reasoning_effort=low]
                subgraph s { inner }
            }"#,
        )
        .unwrap();
        assert_eq!(graph.nodes["inner"].reasoning_effort, "low");
    }

    #[test]
    fn test_redeclaration_merges_attributes() {
        let graph = parse(
            r#"digraph G {
                a [shape=box]
                a [prompt="p"]
            }"#,
        )
        .unwrap();
        assert_eq!(graph.nodes["a"].shape, "box");
        assert_eq!(graph.nodes["a"].prompt, "p");
        assert_eq!(graph.node_order, vec!["a".to_string()]);
    }

    #[test]
    fn test_stray_semicolons_skipped() {
        let graph = parse("digraph G { ;; a ;; b ; }").unwrap();
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn test_quoted_and_numeric_identifiers() {
        let graph = parse(r#"digraph G { "step one" -> 42 }"#).unwrap();
        assert!(graph.nodes.contains_key("step one"));
        assert!(graph.nodes.contains_key("42"));
    }

    #[test]
    fn test_unterminated_brace_is_error() {
        let err = parse("digraph G { a -> b").unwrap_err();
        assert!(err.message.contains("unterminated"), "message: {}", err.message);
    }

    #[test]
    fn test_unexpected_token_reports_position() {
        let err = parse("digraph G { a [x] }").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.column > 0);
        assert!(err.message.contains("expected '='"), "message: {}", err.message);
    }

    #[test]
    fn test_missing_digraph_keyword() {
        let err = parse("graph G {}").unwrap_err();
        assert!(err.message.contains("digraph"));
    }

    #[test]
    fn test_comments_everywhere() {
        let graph = parse(
            r#"digraph G { // line
                /* block
                   spanning lines */
                # hash
                a [prompt="// kept /* verbatim */ # here"]
            }"#,
        )
        .unwrap();
        assert_eq!(graph.nodes["a"].prompt, "// kept /* verbatim */ # here");
    }

    #[test]
    fn test_round_trip() {
        let source = r#"digraph Pipe {
            goal = "build X";
            start [shape=Mdiamond]
            work [shape=box, prompt="do $goal", max_retries=2]
            done [shape=Msquare]
            start -> work
            work -> done [condition="outcome == success", weight=1]
            work -> work [condition="outcome == fail", loop_restart=true]
        }"#;
        let graph = parse(source).unwrap();
        let reparsed = parse(&graph.to_dot()).unwrap();
        assert_eq!(graph, reparsed);
    }

    #[test]
    fn test_round_trip_preserves_escapes() {
        let source = "digraph G { a [prompt=\"line one\\nline \\\"two\\\"\"] }";
        let graph = parse(source).unwrap();
        assert_eq!(graph.nodes["a"].prompt, "line one\nline \"two\"");
        let reparsed = parse(&graph.to_dot()).unwrap();
        assert_eq!(graph, reparsed);
    }
}
