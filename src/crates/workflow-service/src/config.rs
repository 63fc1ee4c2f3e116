//! Service configuration, loaded from the environment.

use tooling::config::{get_env, get_env_or, get_env_parse_or};

use crate::api::error::ApiError;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    /// `None` selects the in-memory checkpointer; a deployment without this set
    /// loses checkpoint history across restarts, which the server logs loudly
    /// at startup rather than refusing to boot.
    pub database_url: Option<String>,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub max_tool_call_iterations: u32,
    pub planner_retry_limit: u32,
    pub request_timeout_secs: u64,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ApiError> {
        let llm_api_key = get_env("WORKFLOW_LLM_API_KEY")
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::Internal("WORKFLOW_LLM_API_KEY is required".to_string()))?;

        Ok(Self {
            bind_addr: get_env_or("WORKFLOW_BIND_ADDR", "0.0.0.0:8080").map_err(|e| ApiError::Internal(e.to_string()))?,
            database_url: get_env("WORKFLOW_DATABASE_URL").map_err(|e| ApiError::Internal(e.to_string()))?,
            llm_api_key,
            llm_base_url: get_env_or("WORKFLOW_LLM_BASE_URL", "https://api.anthropic.com")
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            llm_model: get_env_or("WORKFLOW_LLM_MODEL", "claude-sonnet-4-5").map_err(|e| ApiError::Internal(e.to_string()))?,
            max_tool_call_iterations: get_env_parse_or("WORKFLOW_MAX_TOOL_CALL_ITERATIONS", 6u32)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            planner_retry_limit: get_env_parse_or("WORKFLOW_PLANNER_RETRY_LIMIT", 3u32)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            request_timeout_secs: get_env_parse_or("WORKFLOW_REQUEST_TIMEOUT_SECS", 60u64)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn from_env_requires_an_api_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("WORKFLOW_LLM_API_KEY");
        assert!(ServiceConfig::from_env().is_err());
    }

    #[test]
    fn from_env_applies_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("WORKFLOW_LLM_API_KEY", "test-key");
        std::env::remove_var("WORKFLOW_DATABASE_URL");
        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.database_url.is_none());
        assert_eq!(config.max_tool_call_iterations, 6);
        std::env::remove_var("WORKFLOW_LLM_API_KEY");
    }
}
