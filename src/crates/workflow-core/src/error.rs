//! Error taxonomy for the graph runtime.
//!
//! Variants line up with the error categories the workflow service maps to HTTP
//! status codes: input and state-mismatch errors never touch state; planner and
//! execution errors are caught at the node boundary and folded into a `failed` step
//! or an aborted run; checkpointer errors are fatal for the current request.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    /// Malformed request: missing request text, unknown resume action, step number
    /// outside the plan's range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Resume or retry issued against a thread whose latest checkpoint is not in a
    /// compatible state (e.g. resume when not `awaiting_approval`).
    #[error("state mismatch: {0}")]
    StateMismatch(String),

    /// The LLM failed to produce a schema-valid plan after the bounded retry budget.
    #[error("planner failed: {0}")]
    Planner(String),

    /// A tool or LLM call failed while executing a step.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The checkpointer could not durably record a transition.
    #[error("checkpointer error: {0}")]
    Checkpointer(#[from] workflow_checkpoint::CheckpointError),

    /// An internal invariant was violated (should never surface to a caller).
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl GraphError {
    /// The taxonomy category this error belongs to, for logging and HTTP mapping.
    pub fn category(&self) -> &'static str {
        match self {
            GraphError::InvalidInput(_) => "input",
            GraphError::StateMismatch(_) => "state_mismatch",
            GraphError::Planner(_) => "planner",
            GraphError::Execution(_) => "execution",
            GraphError::Checkpointer(_) => "checkpointer",
            GraphError::Invariant(_) => "invariant",
        }
    }
}
