//! Provider error types

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by LLM providers
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Content filtered: {0}")]
    ContentFilter(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Check if this is a rate limit error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    /// Check if a retry could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::Network(_) => true,
            ProviderError::Timeout(_) => true,
            ProviderError::Auth(_)
            | ProviderError::NotFound(_)
            | ProviderError::ContentFilter(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::Json(_) => false,
        }
    }

    /// Retry-after hint for rate limit errors
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
