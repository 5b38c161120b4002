//! Model gateway — the engine's only suspension point.
//!
//! The engine hands a system prompt and a user context to a generative-text
//! endpoint and gets raw text back. Failures are classified so hosts can
//! choose wait-and-retry (rate limit) over hard-stop (quota exhausted).

pub mod gemini;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::{GeminiConfig, GeminiGateway};

/// Errors from a model gateway call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("unknown generation failure: {0}")]
    Unknown(String),
}

impl GenerationError {
    /// Short machine-readable classification.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::NetworkError(_) => "network_error",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Rate limits and transport failures clear up on their own; quota and
    /// unknown failures need an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::NetworkError(_))
    }
}

/// A generative-text endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generate raw text for the given instructions and context.
    async fn generate(
        &self,
        system_prompt: &str,
        user_context: &str,
    ) -> Result<String, GenerationError>;
}

#[async_trait]
impl<G: ModelGateway + ?Sized> ModelGateway for std::sync::Arc<G> {
    async fn generate(
        &self,
        system_prompt: &str,
        user_context: &str,
    ) -> Result<String, GenerationError> {
        (**self).generate(system_prompt, user_context).await
    }
}

/// Map an unsuccessful HTTP status and body to a generation error.
pub fn classify_status(status: u16, body: &str, retry_after: Option<Duration>) -> GenerationError {
    let quota = mentions_quota(body);
    match status {
        429 if quota => GenerationError::QuotaExceeded(truncate(body)),
        429 => GenerationError::RateLimited { retry_after },
        403 if quota => GenerationError::QuotaExceeded(truncate(body)),
        408 | 502 | 503 | 504 => {
            GenerationError::NetworkError(format!("upstream status {}", status))
        }
        _ => GenerationError::Unknown(format!("upstream status {}: {}", status, truncate(body))),
    }
}

fn mentions_quota(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("quota") || lower.contains("billing")
}

fn truncate(body: &str) -> String {
    const MAX: usize = 240;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
