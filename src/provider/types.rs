//! Provider-neutral request/response types
//!
//! These types model the Anthropic Messages API but stay neutral enough for
//! other providers: a message is an ordered list of content parts, and
//! thinking parts are carried as opaque JSON so adapters can round-trip them
//! verbatim when the provider requires it.

use serde::{Deserialize, Serialize};

/// A completion request - everything needed for one provider call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,

    /// System prompt built by the provider profile
    pub system_prompt: String,

    /// Conversation so far, oldest first
    pub messages: Vec<Message>,

    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,

    /// How the model should choose tools
    pub tool_choice: ToolChoice,

    /// Max tokens for the response
    pub max_tokens: u32,

    /// Reasoning effort hint ("low", "medium", "high")
    pub reasoning_effort: Option<String>,
}

/// Tool-choice mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    /// Model decides whether to call tools
    #[default]
    Auto,
    /// Model must not call tools
    None,
    /// Model must call at least one tool
    Required,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create an assistant message from raw content parts
    pub fn assistant_parts(content: Vec<ContentPart>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Create a tool-result message for a single result
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            role: Role::Tool,
            content: vec![ContentPart::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error,
            }],
        }
    }

    /// Concatenated text parts of this message
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// One part of a message's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },

    /// Opaque provider thinking block, preserved verbatim with its signature
    Thinking {
        raw: serde_json::Value,
    },

    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentPart {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Response from a completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Final text content, if any
    pub text: Option<String>,

    /// Tool calls requested by the model, in request order
    pub tool_calls: Vec<ToolCall>,

    /// Human-readable reasoning summary, if the provider produced one
    pub reasoning_summary: Option<String>,

    /// Token usage for cost tracking
    pub usage: TokenUsage,

    /// Opaque provider response id
    pub response_id: Option<String>,

    /// The full assistant content, including thinking parts, so the next
    /// request can round-trip them
    pub assistant_parts: Vec<ContentPart>,
}

impl CompletionResponse {
    /// A plain-text response with no tool calls (test and stub convenience)
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            assistant_parts: vec![ContentPart::text(text.clone())],
            text: Some(text),
            ..Default::default()
        }
    }

    /// A response requesting the given tool calls
    pub fn from_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        let assistant_parts = tool_calls
            .iter()
            .map(|c| ContentPart::ToolUse {
                id: c.id.clone(),
                name: c.name.clone(),
                input: c.input.clone(),
            })
            .collect();
        Self {
            tool_calls,
            assistant_parts,
            ..Default::default()
        }
    }
}

/// Token usage for cost tracking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

impl TokenUsage {
    /// Accumulate another usage record into this one
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_creation_tokens += other.cache_creation_tokens;
    }
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}
