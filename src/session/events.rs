//! Session events
//!
//! Observers get events, never references into the session's history.
//! Subscribers run serially on the session's task; a panicking subscriber
//! panics the session rather than being swallowed.

use serde_json::Value;

/// Events emitted by an agent session over its lifetime
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SessionStart { session_id: String },
    SessionEnd { session_id: String },
    UserInput { text: String },
    AssistantTextStart,
    AssistantTextDelta { delta: String },
    AssistantTextEnd { text: String },
    ToolCallStart { id: String, name: String, input: Value },
    ToolCallEnd { id: String, name: String, is_error: bool },
    SteeringInjected { text: String },
    TurnLimit { reason: String },
    LoopDetected,
    Error { message: String },
}

type Subscriber = Box<dyn Fn(&SessionEvent) + Send + Sync>;

/// Serial fan-out of session events to subscribers
#[derive(Default)]
pub struct EventEmitter {
    subscribers: Vec<Subscriber>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; called in registration order on every event
    pub fn subscribe(&mut self, subscriber: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Deliver an event to all subscribers, in order
    pub fn emit(&self, event: &SessionEvent) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
    }
}
