//! Persisted interrupt/resume.
//!
//! The original coroutine-style design pauses by suspending an in-memory
//! continuation at the approval point. This runtime never does that: the only
//! record of a suspension is the `awaiting_approval` flag and the step in
//! `StepStatus::AwaitingApproval` inside the checkpointed [`crate::types::GraphState`].
//! Resume reads that state back from the checkpointer and starts a fresh transition;
//! there is no continuation to rehydrate and no in-process table of pending
//! approvals to consult.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GraphError;
use crate::types::{GraphState, Step, StepStatus};

/// What the runtime shows the caller when a step is suspended for approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptDescriptor {
    pub step_number: u32,
    pub description: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Value>,
    pub actions: Vec<String>,
}

/// The caller's decision when resuming a suspended thread.
#[derive(Debug, Clone)]
pub enum ResumeAction {
    Approve,
    Edit(Value),
    Skip,
}

impl ResumeAction {
    pub fn parse(action: &str, content: Option<Value>) -> Result<Self, GraphError> {
        match action {
            "approve" => Ok(ResumeAction::Approve),
            "skip" => Ok(ResumeAction::Skip),
            "edit" => {
                let payload = content.ok_or_else(|| {
                    GraphError::InvalidInput("edit action requires content".to_string())
                })?;
                Ok(ResumeAction::Edit(payload))
            }
            other => Err(GraphError::InvalidInput(format!(
                "unknown resume action: {other}"
            ))),
        }
    }

    /// The wire/action-label form, used to compare decisions across resume
    /// calls without comparing `Edit`'s payload.
    pub fn label(&self) -> &'static str {
        match self {
            ResumeAction::Approve => "approve",
            ResumeAction::Edit(_) => "edit",
            ResumeAction::Skip => "skip",
        }
    }
}

/// Build the descriptor the service surfaces as an `approval_required` frame, from a
/// step that has just transitioned to `awaiting_approval`.
pub fn descriptor_for(step: &Step) -> InterruptDescriptor {
    InterruptDescriptor {
        step_number: step.number,
        description: step.description.clone(),
        reason: step
            .approval_reason
            .clone()
            .unwrap_or_else(|| "this step requires confirmation".to_string()),
        preview: step.preview.clone(),
        actions: vec!["approve".to_string(), "edit".to_string(), "skip".to_string()],
    }
}

/// Find the one step a resume call would act on, verifying the thread is actually
/// suspended. Returns `GraphError::StateMismatch` otherwise, matching the 409
/// boundary behavior.
pub fn awaiting_step(state: &GraphState) -> Result<&Step, GraphError> {
    if !state.awaiting_approval {
        return Err(GraphError::StateMismatch(
            "thread is not awaiting approval".to_string(),
        ));
    }

    let plan = state
        .plan
        .as_ref()
        .ok_or_else(|| GraphError::StateMismatch("thread has no active plan".to_string()))?;

    plan.steps
        .iter()
        .find(|s| s.status == StepStatus::AwaitingApproval)
        .ok_or_else(|| {
            GraphError::StateMismatch("awaiting_approval flag set but no step matches".to_string())
        })
}

/// True when `state` is not currently awaiting approval but its last applied
/// decision used the same action the caller is requesting again — a repeat of
/// an already-resolved `/chat/resume` call. Dedupes by the thread's latest
/// checkpoint rather than by a caller-supplied checkpoint id, since the resume
/// endpoint never receives one.
pub fn is_repeat(state: &GraphState, action: &ResumeAction) -> bool {
    !state.awaiting_approval
        && state
            .applied_decision
            .as_ref()
            .is_some_and(|d| d.action == action.label())
}
