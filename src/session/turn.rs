//! Turn types - the session's conversation history
//!
//! History is an append-only list of turns. Translation back into provider
//! messages happens in one place ([`history_to_messages`]) so the ordering
//! rules - thinking parts first, steering rendered as guidance-prefixed user
//! messages, one tool-result message per result - live in one place too.

use crate::provider::{CompletionResponse, ContentPart, Message, TokenUsage, ToolCall};

/// Prefix rendered in front of steering messages when sent to the provider
pub const STEERING_PREFIX: &str = "[System Guidance]: ";

/// One entry in a session's history
#[derive(Debug, Clone)]
pub enum Turn {
    User { text: String },
    Assistant(AssistantTurn),
    ToolResults { results: Vec<ToolResultRecord> },
    System { text: String },
    Steering { text: String },
}

impl Turn {
    /// The assistant turn, if this is one
    pub fn as_assistant(&self) -> Option<&AssistantTurn> {
        match self {
            Turn::Assistant(turn) => Some(turn),
            _ => None,
        }
    }
}

/// An assistant response recorded in history
#[derive(Debug, Clone, Default)]
pub struct AssistantTurn {
    /// Final text content (may be empty when the model only called tools)
    pub text: String,

    /// Tool calls the model requested, in request order
    pub tool_calls: Vec<ToolCall>,

    /// Reasoning summary, if the provider produced one
    pub reasoning_summary: Option<String>,

    /// Full ordered content parts, thinking blocks included, for round-trip
    pub parts: Vec<ContentPart>,

    /// Token usage of the producing call
    pub usage: TokenUsage,
}

impl AssistantTurn {
    /// Build a turn from a provider response
    pub fn from_response(response: &CompletionResponse) -> Self {
        let text = response.text.clone().unwrap_or_default();
        let parts = if response.assistant_parts.is_empty() && !text.is_empty() {
            vec![ContentPart::text(text.clone())]
        } else {
            response.assistant_parts.clone()
        };
        Self {
            text,
            tool_calls: response.tool_calls.clone(),
            reasoning_summary: response.reasoning_summary.clone(),
            parts,
            usage: response.usage.clone(),
        }
    }

    /// A synthetic turn carrying only text (limits, provider errors)
    pub fn synthetic(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            parts: vec![ContentPart::text(text.clone())],
            text,
            ..Default::default()
        }
    }
}

/// One tool call's outcome, recorded in a ToolResults turn
#[derive(Debug, Clone)]
pub struct ToolResultRecord {
    pub tool_use_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

/// Translate history into provider-neutral messages
pub fn history_to_messages(history: &[Turn]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len());
    for turn in history {
        match turn {
            Turn::User { text } => messages.push(Message::user(text.clone())),
            Turn::Assistant(turn) => messages.push(Message::assistant_parts(turn.parts.clone())),
            Turn::ToolResults { results } => {
                for result in results {
                    messages.push(Message::tool_result(
                        result.tool_use_id.clone(),
                        result.content.clone(),
                        result.is_error,
                    ));
                }
            }
            Turn::System { text } => messages.push(Message::system(text.clone())),
            Turn::Steering { text } => {
                messages.push(Message::user(format!("{}{}", STEERING_PREFIX, text)));
            }
        }
    }
    messages
}
