//! Anthropic Messages API adapter
//!
//! Translates the provider-neutral request into the Messages API body and
//! back. Thinking blocks come back as opaque JSON and are re-sent verbatim
//! on the next turn, as the API requires.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::LlmConfig;

use super::{
    CompletionRequest, CompletionResponse, ContentPart, Message, Provider, ProviderError, Role, TokenUsage, ToolCall,
    ToolChoice,
};

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a provider from configuration
    ///
    /// Reads the API key from the environment variable named in the config;
    /// a missing key is an authentication error.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ProviderError::Auth(format!("Environment variable {} not set", config.api_key_env)))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self {
            api_key,
            base_url: config.base_url.clone(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let (system, messages) = convert_messages(&request.system_prompt, &request.messages);

        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": system,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            body["tools"] = json!(
                request
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.input_schema,
                        })
                    })
                    .collect::<Vec<_>>()
            );
            body["tool_choice"] = match request.tool_choice {
                ToolChoice::Auto => json!({"type": "auto"}),
                ToolChoice::None => json!({"type": "none"}),
                ToolChoice::Required => json!({"type": "any"}),
            };
        }

        if let Some(effort) = &request.reasoning_effort
            && let Some(budget) = thinking_budget(effort)
        {
            body["thinking"] = json!({"type": "enabled", "budget_tokens": budget});
        }

        body
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse, ProviderError> {
        let content = body["content"]
            .as_array()
            .ok_or_else(|| ProviderError::InvalidResponse("response has no content array".to_string()))?;

        let mut text_parts: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut reasoning_summary: Option<String> = None;
        let mut assistant_parts: Vec<ContentPart> = Vec::new();

        for block in content {
            match block["type"].as_str() {
                Some("text") => {
                    let text = block["text"].as_str().unwrap_or_default().to_string();
                    assistant_parts.push(ContentPart::text(text.clone()));
                    text_parts.push(text);
                }
                Some("tool_use") => {
                    let call = ToolCall {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        input: block["input"].clone(),
                    };
                    assistant_parts.push(ContentPart::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.input.clone(),
                    });
                    tool_calls.push(call);
                }
                Some("thinking") | Some("redacted_thinking") => {
                    if reasoning_summary.is_none() {
                        reasoning_summary = block["thinking"].as_str().map(String::from);
                    }
                    // Preserved verbatim, signature included, for the next turn
                    assistant_parts.push(ContentPart::Thinking { raw: block.clone() });
                }
                _ => {}
            }
        }

        let usage = &body["usage"];
        Ok(CompletionResponse {
            text: if text_parts.is_empty() {
                None
            } else {
                Some(text_parts.join(""))
            },
            tool_calls,
            reasoning_summary,
            usage: TokenUsage {
                input_tokens: usage["input_tokens"].as_u64().unwrap_or(0),
                output_tokens: usage["output_tokens"].as_u64().unwrap_or(0),
                cache_read_tokens: usage["cache_read_input_tokens"].as_u64().unwrap_or(0),
                cache_creation_tokens: usage["cache_creation_input_tokens"].as_u64().unwrap_or(0),
            },
            response_id: body["id"].as_str().map(String::from),
            assistant_parts,
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);
        debug!(model = %request.model, messages = request.messages.len(), "AnthropicProvider::complete: sending");

        let response = self
            .http
            .post(url)
            .header("x-api-key", self.api_key.clone())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, text));
        }

        let body: Value = response.json().await.map_err(ProviderError::Network)?;
        self.parse_response(body)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Map an HTTP error status and body to the typed error kinds
fn classify_api_error(status: u16, message: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(message),
        404 => ProviderError::NotFound(message),
        _ if message.to_lowercase().contains("content filter") => ProviderError::ContentFilter(message),
        _ => ProviderError::Api { status, message },
    }
}

/// Translate reasoning effort to a thinking token budget
fn thinking_budget(effort: &str) -> Option<u32> {
    match effort {
        "low" => Some(2_048),
        "medium" => Some(8_192),
        "high" => Some(16_384),
        _ => None,
    }
}

/// Flatten neutral messages into the Messages API shape
///
/// System-role messages fold into the system string; tool-role messages
/// become user messages with tool_result blocks; thinking parts pass through
/// untouched.
fn convert_messages(system_prompt: &str, messages: &[Message]) -> (String, Vec<Value>) {
    let mut system = system_prompt.to_string();
    let mut out: Vec<Value> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => {
                if !system.is_empty() {
                    system.push_str("\n\n");
                }
                system.push_str(&msg.text());
            }
            Role::User | Role::Tool => {
                out.push(json!({"role": "user", "content": convert_parts(&msg.content)}));
            }
            Role::Assistant => {
                out.push(json!({"role": "assistant", "content": convert_parts(&msg.content)}));
            }
        }
    }

    (system, out)
}

fn convert_parts(parts: &[ContentPart]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => json!({"type": "text", "text": text}),
            ContentPart::Thinking { raw } => raw.clone(),
            ContentPart::ToolUse { id, name, input } => {
                json!({"type": "tool_use", "id": id, "name": name, "input": input})
            }
            ContentPart::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error,
            }),
        })
        .collect()
}
