//! LLM provider contract
//!
//! The engine and agent sessions only ever see [`Provider::complete`] - one
//! request in, one response out. Concrete HTTP adapters live next to this
//! module; the [`scripted`] double stands in for the network in tests and
//! dry runs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

mod anthropic;
mod error;
mod profile;
mod types;

pub use anthropic::AnthropicProvider;
pub use error::ProviderError;
pub use profile::ProviderProfile;
pub use scripted::ScriptedProvider;
pub use types::{
    CompletionRequest, CompletionResponse, ContentPart, Message, Role, TokenUsage, ToolCall, ToolChoice,
    ToolDefinition,
};

use crate::config::LlmConfig;

/// A completion-capable LLM backend
///
/// Each call is independent; conversation state lives in the session's
/// history, not in the provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send one completion request and wait for the full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Provider name for logs and status artifacts
    fn name(&self) -> &str;
}

/// Create a provider by name
///
/// `scripted` yields an empty scripted provider (useful for dry runs); any
/// other unknown name is a configuration error.
pub fn create_provider(name: &str, config: &LlmConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    debug!(provider = %name, model = %config.model, "create_provider: called");
    match name {
        "anthropic" => Ok(Arc::new(AnthropicProvider::from_config(config)?)),
        "scripted" => Ok(Arc::new(ScriptedProvider::new(vec![]))),
        other => Err(ProviderError::InvalidResponse(format!(
            "Unknown LLM provider: '{}'. Supported: anthropic, scripted",
            other
        ))),
    }
}

/// Scripted provider - replays queued responses and records requests
pub mod scripted {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{CompletionRequest, CompletionResponse, Provider, ProviderError};

    /// Replays a fixed list of responses in order
    ///
    /// Every request it receives is recorded so tests can assert on the
    /// messages the session actually sent. When the script runs dry,
    /// `complete` fails.
    pub struct ScriptedProvider {
        responses: Mutex<VecDeque<CompletionResponse>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Number of requests received so far
        pub fn call_count(&self) -> usize {
            self.requests.lock().expect("requests lock").len()
        }

        /// Copies of every request received so far
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
            self.requests.lock().expect("requests lock").push(request);
            self.responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .ok_or_else(|| ProviderError::InvalidResponse("Scripted provider exhausted".to_string()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::provider::{Message, ToolChoice};

        fn request(text: &str) -> CompletionRequest {
            CompletionRequest {
                model: "test-model".to_string(),
                system_prompt: "system".to_string(),
                messages: vec![Message::user(text)],
                tools: vec![],
                tool_choice: ToolChoice::Auto,
                max_tokens: 100,
                reasoning_effort: None,
            }
        }

        #[tokio::test]
        async fn test_replays_in_order() {
            let provider = ScriptedProvider::new(vec![
                CompletionResponse::from_text("one"),
                CompletionResponse::from_text("two"),
            ]);

            let first = provider.complete(request("a")).await.unwrap();
            let second = provider.complete(request("b")).await.unwrap();
            assert_eq!(first.text.as_deref(), Some("one"));
            assert_eq!(second.text.as_deref(), Some("two"));
            assert_eq!(provider.call_count(), 2);
        }

        #[tokio::test]
        async fn test_errors_when_exhausted() {
            let provider = ScriptedProvider::new(vec![]);
            let result = provider.complete(request("a")).await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_records_requests() {
            let provider = ScriptedProvider::new(vec![CompletionResponse::from_text("ok")]);
            provider.complete(request("hello")).await.unwrap();

            let requests = provider.requests();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].messages[0].text(), "hello");
        }
    }
}
