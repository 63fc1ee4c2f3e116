//! Tool-dispatch seam.
//!
//! [`ClaudeGateway`](crate::claude::ClaudeGateway) recognizes a tool-call request
//! in the model's text but does not itself know how to run tools — that's
//! deployment-specific (a local function, an MCP server, a sidecar HTTP service).
//! [`ToolDispatcher`] is the seam: the gateway only ever holds an
//! `Arc<dyn ToolDispatcher>`, the same pattern [`GatewayConfig`](crate::config::GatewayConfig)
//! uses for provider wiring.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Runs a tool call requested mid-step and returns its result as text, folded
/// back into the conversation for the next model turn.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, tool_id: &str, step_description: &str) -> Result<String, LlmError>;
}

/// Disclosed default: acknowledges the call without running anything. A
/// deployment that wires real tools must supply a [`ToolDispatcher`] of its own
/// (e.g. [`HttpToolDispatcher`]) via [`ClaudeGateway::with_dispatcher`](crate::claude::ClaudeGateway::with_dispatcher).
pub struct NoopToolDispatcher;

#[async_trait]
impl ToolDispatcher for NoopToolDispatcher {
    async fn dispatch(&self, tool_id: &str, _step_description: &str) -> Result<String, LlmError> {
        Ok(format!("tool '{tool_id}' executed successfully"))
    }
}

/// Dispatches to a sidecar HTTP service: `POST {base_url}/tools/{tool_id}/invoke`
/// with `{step_description}`, expecting `{"result": string}` back.
pub struct HttpToolDispatcher {
    client: Client,
    base_url: String,
}

impl HttpToolDispatcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into() }
    }
}

#[derive(Debug, Serialize)]
struct ToolInvokeRequest<'a> {
    step_description: &'a str,
}

#[derive(Debug, Deserialize)]
struct ToolInvokeResponse {
    result: String,
}

#[async_trait]
impl ToolDispatcher for HttpToolDispatcher {
    async fn dispatch(&self, tool_id: &str, step_description: &str) -> Result<String, LlmError> {
        let url = format!("{}/tools/{tool_id}/invoke", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ToolInvokeRequest { step_description })
            .send()
            .await
            .map_err(LlmError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider(format!("tool dispatch for '{tool_id}' failed {status}: {text}")));
        }

        let parsed: ToolInvokeResponse = response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(parsed.result)
    }
}
