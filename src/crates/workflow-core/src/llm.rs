//! The narrow interface the graph runtime uses to call out to an LLM.
//!
//! The runtime only ever holds an `Arc<dyn LlmGateway>`; `workflow-llm` supplies the
//! concrete providers. Keeping the trait here (rather than in `workflow-llm`) avoids
//! a dependency cycle, since the trait's operations are expressed in terms of this
//! crate's `Plan`/`Step`/`GraphState` types.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::GraphError;
use crate::types::{GraphState, Message, Plan, Step};
use workflow_registry::Tool;

/// The structured result of executing one step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub result_text: String,
    pub tool_outputs: Option<Value>,
    pub rationale: String,
}

/// A channel the gateway may push partial tokens into while it works. `None` means
/// the caller doesn't want a streaming variant for this call.
pub type TokenSink = Option<mpsc::Sender<String>>;

#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Produce a schema-valid plan for a fresh or follow-up request. Implementations
    /// are responsible for retrying malformed output internally, up to their own
    /// bounded retry budget, before returning `GraphError::Planner`.
    async fn plan(
        &self,
        request: &str,
        history: &[Message],
        tools: &[Tool],
        tokens: TokenSink,
    ) -> Result<Plan, GraphError>;

    /// Execute one step, optionally running a bounded tool-call loop. Implementations
    /// enforce their own hard cap on loop iterations.
    async fn execute_step(
        &self,
        step: &Step,
        state: &GraphState,
        tools: &[Tool],
        tokens: TokenSink,
    ) -> Result<StepOutcome, GraphError>;
}
