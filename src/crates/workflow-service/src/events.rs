//! The wire-level SSE frame protocol.
//!
//! Mirrors the shape of a realtime event enum: a tagged union with one variant
//! per frame kind, a `frame_type()` accessor for logging, and `to_sse_data()` for
//! serializing the payload onto the wire. Unlike a websocket broadcast, every
//! frame here belongs to exactly one request's stream; there is no fan-out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use workflow_core::interrupt::InterruptDescriptor;
use workflow_core::types::PlanView;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StreamFrame {
    #[serde(rename = "thinking")]
    Thinking { text: String },

    #[serde(rename = "integrations_ready")]
    IntegrationsReady { integrations: Vec<workflow_registry::Integration> },

    #[serde(rename = "integration_added_incrementally")]
    IntegrationAddedIncrementally { integration: workflow_registry::Integration },

    /// The canonical snapshot frame: enough for a client to render full plan and
    /// step state from this one frame, emitted after every node transition.
    #[serde(rename = "progress")]
    Progress { thread_id: String, current_step: u32, plan: PlanView },

    #[serde(rename = "step_thinking")]
    StepThinking { step: u32, text: String },

    #[serde(rename = "token")]
    Token { text: String },

    #[serde(rename = "approval_required")]
    ApprovalRequired { descriptor: InterruptDescriptor },

    #[serde(rename = "error")]
    Error { category: String, message: String },

    #[serde(rename = "done")]
    Done { final_message: String },
}

impl StreamFrame {
    pub fn frame_type(&self) -> &'static str {
        match self {
            StreamFrame::Thinking { .. } => "thinking",
            StreamFrame::IntegrationsReady { .. } => "integrations_ready",
            StreamFrame::IntegrationAddedIncrementally { .. } => "integration_added_incrementally",
            StreamFrame::Progress { .. } => "progress",
            StreamFrame::StepThinking { .. } => "step_thinking",
            StreamFrame::Token { .. } => "token",
            StreamFrame::ApprovalRequired { .. } => "approval_required",
            StreamFrame::Error { .. } => "error",
            StreamFrame::Done { .. } => "done",
        }
    }

    /// Canonical frames are never dropped by the service's buffering; token
    /// frames may be, since they are redundant with the final step result.
    pub fn is_droppable(&self) -> bool {
        matches!(self, StreamFrame::Token { .. })
    }

    pub fn to_json_value(&self) -> Value {
        serde_json::to_value(self).expect("StreamFrame always serializes")
    }

    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).expect("StreamFrame always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_frame_serializes_with_tag_and_content() {
        let frame = StreamFrame::Progress {
            thread_id: "t1".to_string(),
            current_step: 1,
            plan: PlanView { thinking: "searching".to_string(), steps: Vec::new(), is_complete: false },
        };
        let value = frame.to_json_value();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["data"]["thread_id"], "t1");
        assert_eq!(value["data"]["current_step"], 1);
        assert_eq!(value["data"]["plan"]["thinking"], "searching");
        assert_eq!(value["data"]["plan"]["is_complete"], false);
    }

    #[test]
    fn token_frame_is_droppable_canonical_frames_are_not() {
        assert!(StreamFrame::Token { text: "hi".to_string() }.is_droppable());
        assert!(!StreamFrame::Done { final_message: "done".to_string() }.is_droppable());
        assert!(!StreamFrame::ApprovalRequired {
            descriptor: InterruptDescriptor {
                step_number: 1,
                description: "d".to_string(),
                reason: "r".to_string(),
                preview: None,
                actions: vec!["approve".to_string()],
            }
        }
        .is_droppable());
    }

    #[test]
    fn error_frame_carries_category_and_message() {
        let frame = StreamFrame::Error { category: "planner".to_string(), message: "bad json".to_string() };
        assert_eq!(frame.frame_type(), "error");
        let value = frame.to_json_value();
        assert_eq!(value["data"]["category"], "planner");
    }

    #[test]
    fn done_frame_round_trips_through_json() {
        let frame = StreamFrame::Done { final_message: "all set".to_string() };
        let json = frame.to_sse_data();
        let parsed: StreamFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.frame_type(), "done");
    }
}
