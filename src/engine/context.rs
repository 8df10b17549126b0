//! Pipeline context - the shared key/value state between nodes
//!
//! The context is mutated only by the engine, between node executions;
//! handlers report updates through their [`Outcome`](super::Outcome) and the
//! engine merges them atomically before evaluating any downstream edge.

use std::collections::HashMap;

/// String key/value state threaded through a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineContext {
    values: HashMap<String, String>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Merge updates; later writes overwrite
    pub fn merge(&mut self, updates: &HashMap<String, String>) {
        for (key, value) in updates {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }
}

/// Expand `$goal` and `${context.<key>}` placeholders in a template
///
/// Unknown context keys expand to the empty string. `${context.*}` is
/// substituted first so the goal cannot introduce new placeholders.
pub fn expand(template: &str, goal: &str, ctx: &PipelineContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${context.") {
        out.push_str(&rest[..start]);
        let after = &rest[start + "${context.".len()..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                out.push_str(ctx.get(key).unwrap_or(""));
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated placeholder; keep it literally
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    out.replace("$goal", goal)
}
