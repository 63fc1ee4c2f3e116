//! Gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

/// Connection details for the remote model backing a gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_planner_retry_limit")]
    pub planner_retry_limit: u32,
    #[serde(default = "default_max_tool_call_iterations")]
    pub max_tool_call_iterations: u32,
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
            planner_retry_limit: default_planner_retry_limit(),
            max_tool_call_iterations: default_max_tool_call_iterations(),
        }
    }

    pub fn from_env(env_var: &str, base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(env_var).map_err(|_| LlmError::ApiKeyMissing(env_var.to_string()))?;
        Ok(Self::new(api_key, base_url, model))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_planner_retry_limit(mut self, limit: u32) -> Self {
        self.planner_retry_limit = limit;
        self
    }

    pub fn with_max_tool_call_iterations(mut self, limit: u32) -> Self {
        self.max_tool_call_iterations = limit;
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_planner_retry_limit() -> u32 {
    3
}

fn default_max_tool_call_iterations() -> u32 {
    6
}
