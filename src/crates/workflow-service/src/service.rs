//! Orchestration layer: owns the runtime's dependencies, translates
//! [`RuntimeEvent`]s into wire-level [`StreamFrame`]s, and fronts the
//! registry-level frames the runtime itself has no notion of.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use workflow_checkpoint::CheckpointSaver;
use workflow_core::interrupt;
use workflow_core::runtime::RuntimeEvent;
use workflow_core::{GraphError, GraphRuntime, GraphState, LlmGateway, ResumeAction};
use workflow_registry::ToolRegistry;

use crate::api::error::ApiError;
use crate::events::StreamFrame;
use crate::metadata::{self, ConversationMetadataHook, InMemoryConversationMetadataHook};

const FRAME_BUFFER: usize = 64;

pub struct WorkflowService {
    checkpointer: Arc<dyn CheckpointSaver>,
    runtime: Arc<GraphRuntime>,
    metadata_hook: Arc<dyn ConversationMetadataHook>,
}

impl WorkflowService {
    pub fn new(checkpointer: Arc<dyn CheckpointSaver>, gateway: Arc<dyn LlmGateway>) -> Self {
        let runtime = Arc::new(GraphRuntime::new(checkpointer.clone(), gateway));
        Self {
            checkpointer,
            runtime,
            metadata_hook: Arc::new(InMemoryConversationMetadataHook::new()),
        }
    }

    /// Override the conversation-metadata hook, e.g. to back it with the same
    /// store as conversation history in a real deployment.
    pub fn with_metadata_hook(mut self, hook: Arc<dyn ConversationMetadataHook>) -> Self {
        self.metadata_hook = hook;
        self
    }

    /// Start a fresh top-level request on a thread, returning a channel of frames
    /// the HTTP layer forwards onto an SSE stream (or drains for the non-streaming
    /// `/chat` endpoint).
    pub async fn stream_fresh_request(
        &self,
        thread_id: String,
        text: String,
        credentials: HashMap<String, String>,
    ) -> Result<mpsc::Receiver<StreamFrame>, ApiError> {
        let registry = ToolRegistry::build(&credentials).map_err(ApiError::from)?;
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER);

        announce_integrations(&frame_tx, &registry).await;

        let runtime = self.runtime.clone();
        let metadata_hook = self.metadata_hook.clone();
        let title = metadata::derive_title(&text);
        tokio::spawn(async move {
            let (event_tx, event_rx) = mpsc::channel(FRAME_BUFFER);
            let conversation_metadata = Some((metadata_hook, thread_id.clone(), title));
            let forward = tokio::spawn(forward_events(event_rx, frame_tx.clone(), conversation_metadata));
            if let Err(err) = runtime.fresh_request(&thread_id, &text, &credentials, event_tx).await {
                warn!(thread_id, error = %err, "fresh request ended in error");
            }
            let _ = forward.await;
        });

        Ok(frame_rx)
    }

    /// Apply an `approve` / `edit` / `skip` decision to a suspended thread.
    ///
    /// The thread is checked against [`interrupt::awaiting_step`] before anything is
    /// spawned, so a thread that isn't actually suspended gets a bare 409 with no
    /// frames at all, rather than an SSE stream that immediately errors.
    pub async fn stream_resume(
        &self,
        thread_id: String,
        action: &str,
        content: Option<serde_json::Value>,
    ) -> Result<mpsc::Receiver<StreamFrame>, ApiError> {
        let action = ResumeAction::parse(action, content).map_err(ApiError::from)?;

        let state = self.load_state(&thread_id).await?;
        if !interrupt::is_repeat(&state, &action) {
            interrupt::awaiting_step(&state).map_err(ApiError::from)?;
        }

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER);

        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            let (event_tx, event_rx) = mpsc::channel(FRAME_BUFFER);
            let forward = tokio::spawn(forward_events(event_rx, frame_tx, None));
            if let Err(err) = runtime.resume(&thread_id, action, event_tx).await {
                warn!(thread_id, error = %err, "resume ended in error");
            }
            let _ = forward.await;
        });

        Ok(frame_rx)
    }

    /// Reopen the given step (and every step after it) on a thread and continue
    /// execution from there.
    ///
    /// `step_number` is validated against the thread's plan before anything is
    /// spawned, so a step number outside the plan's range returns a bare 400 with
    /// no frames, matching the boundary behavior of the other chat endpoints.
    pub async fn stream_retry(
        &self,
        thread_id: String,
        step_number: u32,
    ) -> Result<mpsc::Receiver<StreamFrame>, ApiError> {
        let state = self.load_state(&thread_id).await?;
        let plan = state
            .plan
            .as_ref()
            .ok_or_else(|| ApiError::from(GraphError::StateMismatch("thread has no plan to retry".to_string())))?;
        if plan.step(step_number).is_none() {
            return Err(ApiError::from(GraphError::InvalidInput(format!(
                "step {step_number} is outside the plan's range 1..={}",
                plan.len()
            ))));
        }

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER);

        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            let (event_tx, event_rx) = mpsc::channel(FRAME_BUFFER);
            let forward = tokio::spawn(forward_events(event_rx, frame_tx, None));
            if let Err(err) = runtime.retry(&thread_id, step_number, event_tx).await {
                warn!(thread_id, error = %err, "retry ended in error");
            }
            let _ = forward.await;
        });

        Ok(frame_rx)
    }

    /// The latest persisted state for a thread, for the history endpoint. Returns
    /// only the most recent checkpoint; full history reconstruction is left to the
    /// checkpointer's `list` for callers that need it directly.
    pub async fn latest_state(&self, thread_id: &str) -> Result<GraphState, ApiError> {
        let checkpoint = self
            .checkpointer
            .get_latest(thread_id)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::NotFound(format!("no history for thread {thread_id}")))?;

        serde_json::from_value(checkpoint.state)
            .map_err(|e| ApiError::Internal(format!("corrupt checkpoint: {e}")))
    }

    /// The short name of the active checkpointer backend, surfaced on `/healthz`.
    pub fn checkpointer_backend(&self) -> &'static str {
        self.checkpointer.backend_kind()
    }

    /// Load a thread's latest state for a pre-flight check, treating a missing
    /// checkpoint as a 409 rather than a 404: resuming or retrying a thread that
    /// never ran is a state mismatch, not a lookup failure.
    async fn load_state(&self, thread_id: &str) -> Result<GraphState, ApiError> {
        let checkpoint = self
            .checkpointer
            .get_latest(thread_id)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::from(GraphError::StateMismatch(format!("no checkpoint exists for thread {thread_id}"))))?;

        serde_json::from_value(checkpoint.state)
            .map_err(|e| ApiError::Internal(format!("corrupt checkpoint: {e}")))
    }
}

async fn announce_integrations(frame_tx: &mpsc::Sender<StreamFrame>, registry: &ToolRegistry) {
    let frame = StreamFrame::IntegrationsReady { integrations: registry.integrations().to_vec() };
    let _ = frame_tx.send(frame).await;
}

/// Translates runtime events onto the wire and, when `conversation_metadata` is
/// `Some`, fires the metadata hook on the first `progress` frame observed — the
/// "first `progress` frame of a brand-new thread" the metadata contract names.
/// Only `stream_fresh_request` passes `Some`; resume and retry never originate a
/// brand-new thread, so they pass `None`.
async fn forward_events(
    mut events: mpsc::Receiver<RuntimeEvent>,
    frames: mpsc::Sender<StreamFrame>,
    conversation_metadata: Option<(Arc<dyn ConversationMetadataHook>, String, String)>,
) {
    let mut metadata_pending = conversation_metadata;

    while let Some(event) = events.recv().await {
        if let RuntimeEvent::Progress { .. } = &event {
            if let Some((hook, thread_id, title)) = metadata_pending.take() {
                hook.record_if_absent(&thread_id, &title).await;
            }
        }

        let frame = match event {
            RuntimeEvent::Thinking { text } => StreamFrame::Thinking { text },
            RuntimeEvent::Progress { thread_id, current_step, plan } => {
                StreamFrame::Progress { thread_id, current_step, plan }
            }
            RuntimeEvent::StepThinking { step, text } => StreamFrame::StepThinking { step, text },
            RuntimeEvent::Token { text } => StreamFrame::Token { text },
            RuntimeEvent::ApprovalRequired(descriptor) => StreamFrame::ApprovalRequired { descriptor },
            RuntimeEvent::Error { category, message } => {
                StreamFrame::Error { category: category.to_string(), message }
            }
            RuntimeEvent::Done { final_message } => StreamFrame::Done { final_message },
        };
        let droppable = frame.is_droppable();
        if droppable {
            let _ = frames.try_send(frame);
        } else if frames.send(frame).await.is_err() {
            break;
        }
    }
}
