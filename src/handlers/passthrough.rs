//! Pass-through handlers: start, exit, conditional, parallel, fan-in
//!
//! These shapes are control-flow markers. The handler itself does nothing
//! and succeeds; the engine gives the shape its meaning (start selection,
//! run termination, edge-condition routing, fork, join).

use async_trait::async_trait;

use crate::engine::Outcome;

use super::{HandlerCtx, HandlerKind, NodeHandler};

/// No-op handler that reports a control-flow kind
pub struct PassthroughHandler {
    kind: HandlerKind,
}

impl PassthroughHandler {
    pub fn new(kind: HandlerKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl NodeHandler for PassthroughHandler {
    fn kind(&self) -> HandlerKind {
        self.kind
    }

    async fn run(&self, _ctx: HandlerCtx<'_>) -> eyre::Result<Outcome> {
        Ok(Outcome::success())
    }
}
