//! Error types for LLM gateway implementations.

use thiserror::Error;
use workflow_core::GraphError;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors internal to a gateway provider, before they are folded into the
/// runtime's [`GraphError`] taxonomy at the trait boundary.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("API key not configured: {0}")]
    ApiKeyMissing(String),

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("provider returned a plan that failed schema validation after {attempts} attempts: {last_error}")]
    PlanerRetriesExhausted { attempts: u32, last_error: String },

    #[error("provider error: {0}")]
    Provider(String),
}

impl LlmError {
    /// Transient network/server errors worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Http(_) | LlmError::RateLimitExceeded(_))
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, LlmError::Authentication(_) | LlmError::ApiKeyMissing(_))
    }
}

/// Authentication and configuration failures are input errors; malformed-plan
/// exhaustion is a planner failure; everything else executing a step is an
/// execution failure. The call site (plan vs. execute_step) picks the right
/// variant rather than this blanket conversion, since the same underlying HTTP
/// error means different things in each context.
impl LlmError {
    pub fn into_planner_error(self) -> GraphError {
        GraphError::Planner(self.to_string())
    }

    pub fn into_execution_error(self) -> GraphError {
        GraphError::Execution(self.to_string())
    }
}
