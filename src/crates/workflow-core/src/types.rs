//! Domain types shared by every node in the graph runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use workflow_registry::ToolRegistry;

use crate::error::GraphError;

pub type ThreadId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

/// One entry in a thread's append-only message sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    AwaitingApproval,
    Completed,
    Failed,
    Skipped,
}

/// One unit of work in a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// 1-based, dense, monotonic within a plan.
    pub number: u32,
    pub description: String,
    #[serde(default)]
    pub expected_tool_ids: Vec<String>,
    pub requires_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_reason: Option<String>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_outputs: Option<Value>,
}

impl Step {
    pub fn new(number: u32, description: impl Into<String>) -> Self {
        Self {
            number,
            description: description.into(),
            expected_tool_ids: Vec::new(),
            requires_approval: false,
            approval_reason: None,
            status: StepStatus::Pending,
            result: None,
            error: None,
            rationale: None,
            preview: None,
            tool_outputs: None,
        }
    }

    /// Reset this step back to `pending`, clearing terminal-state fields. Used by
    /// retry, which resets a step and every step after it.
    pub fn reopen(&mut self) {
        self.status = StepStatus::Pending;
        self.result = None;
        self.error = None;
        self.tool_outputs = None;
    }
}

/// Produced by the planner node. A thread holds at most one active plan; a new
/// top-level request replaces it while preserving message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub original_request: String,
    pub rationale: String,
    pub steps: Vec<Step>,
    pub is_complete: bool,
}

impl Plan {
    pub fn new(original_request: impl Into<String>, rationale: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            original_request: original_request.into(),
            rationale: rationale.into(),
            steps,
            is_complete: false,
        }
    }

    /// Step numbers must be exactly `1..=N` with no gaps, and at most one step may
    /// be `in_progress` or `awaiting_approval` at a time.
    pub fn validate(&self) -> std::result::Result<(), GraphError> {
        for (i, step) in self.steps.iter().enumerate() {
            if step.number != (i as u32) + 1 {
                return Err(GraphError::Invariant(format!(
                    "step numbers must be dense starting at 1, got {} at position {}",
                    step.number, i
                )));
            }
        }

        let in_progress = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::InProgress)
            .count();
        if in_progress > 1 {
            return Err(GraphError::Invariant(
                "more than one step is in_progress".to_string(),
            ));
        }

        let awaiting = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::AwaitingApproval)
            .count();
        if awaiting > 1 {
            return Err(GraphError::Invariant(
                "more than one step is awaiting_approval".to_string(),
            ));
        }

        Ok(())
    }

    pub fn step(&self, number: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.number == number)
    }

    pub fn step_mut(&mut self, number: u32) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.number == number)
    }

    pub fn len(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A renderable snapshot of a plan, built fresh from [`Plan`] for the `progress`
/// wire frame. `thinking` is the wire name for the plan's `rationale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanView {
    pub thinking: String,
    pub steps: Vec<Step>,
    pub is_complete: bool,
}

impl PlanView {
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            thinking: plan.rationale.clone(),
            steps: plan.steps.clone(),
            is_complete: plan.is_complete,
        }
    }
}

/// Records the one resume decision applied to a checkpoint, so a second
/// identical `/chat/resume` call against the same decision can be recognized as
/// a repeat rather than a state mismatch (see [`crate::interrupt::is_repeat`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedDecision {
    pub checkpoint_id: String,
    pub step_number: u32,
    pub action: String,
}

/// The single value persisted per checkpoint: everything the graph runtime needs to
/// resume a thread from exactly where it left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphState {
    pub thread_id: ThreadId,
    pub messages: Vec<Message>,
    pub plan: Option<Plan>,
    /// 0 when there is no plan yet; otherwise the 1-based number of the step the
    /// router will consider next. The planner sets it to 1; the executor
    /// increments it on a step's success or skip (never on failure); retry sets
    /// it to `step_number - 1`.
    pub current_step: u32,
    pub registry: ToolRegistry,
    pub last_error: Option<String>,
    pub awaiting_approval: bool,
    pub is_complete: bool,
    #[serde(default)]
    pub applied_decision: Option<AppliedDecision>,
}

impl GraphState {
    pub fn fresh(thread_id: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            plan: None,
            current_step: 0,
            registry,
            last_error: None,
            awaiting_approval: false,
            is_complete: false,
            applied_decision: None,
        }
    }
}
