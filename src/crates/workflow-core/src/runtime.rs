//! The graph runtime: a fixed four-node state machine (planner, router, executor,
//! synthesizer) instead of a general cyclic graph engine. A request drives the
//! machine through one or more transitions, checkpointing the resulting
//! [`GraphState`] after every one, until it either suspends for approval or
//! reaches `synthesizer` and completes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use workflow_checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSaver, CheckpointSource};
use workflow_registry::ToolRegistry;

use crate::error::GraphError;
use crate::interrupt::{self, ResumeAction};
use crate::llm::{LlmGateway, TokenSink};
use crate::lock::ThreadLockRegistry;
use crate::types::{AppliedDecision, GraphState, Message, PlanView, StepStatus};

/// Coarse-grained progress the workflow service translates into SSE frames. The
/// runtime only knows about graph transitions; it has no notion of the wire
/// protocol.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Thinking { text: String },
    /// The canonical snapshot, emitted after every node transition: enough for
    /// a client to render full step state from this one frame.
    Progress { thread_id: String, current_step: u32, plan: PlanView },
    StepThinking { step: u32, text: String },
    Token { text: String },
    ApprovalRequired(interrupt::InterruptDescriptor),
    Error { category: &'static str, message: String },
    Done { final_message: String },
}

/// Bounded: the caller never blocks the runtime on a full buffer for token
/// frames, but canonical frames (progress, approval, error, done) are sent with a
/// blocking `.send` so they are never silently dropped.
async fn emit(tx: &mpsc::Sender<RuntimeEvent>, event: RuntimeEvent) {
    let is_droppable = matches!(event, RuntimeEvent::Token { .. });
    if is_droppable {
        let _ = tx.try_send(event);
    } else if tx.send(event).await.is_err() {
        warn!("runtime event receiver dropped mid-transition");
    }
}

/// Emit the canonical snapshot frame. Called after every node transition that
/// changes plan or step state: plan creation, a step entering `in_progress`, a
/// step reaching a terminal status, and the synthesizer completing the thread.
async fn emit_progress(tx: &mpsc::Sender<RuntimeEvent>, state: &GraphState) {
    let Some(plan) = state.plan.as_ref() else { return };
    emit(
        tx,
        RuntimeEvent::Progress {
            thread_id: state.thread_id.clone(),
            current_step: state.current_step,
            plan: PlanView::from_plan(plan),
        },
    )
    .await;
}

pub struct GraphRuntime {
    checkpointer: Arc<dyn CheckpointSaver>,
    gateway: Arc<dyn LlmGateway>,
    locks: Arc<ThreadLockRegistry>,
}

impl GraphRuntime {
    pub fn new(checkpointer: Arc<dyn CheckpointSaver>, gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            checkpointer,
            gateway,
            locks: Arc::new(ThreadLockRegistry::new()),
        }
    }

    /// Start or continue a thread with a new top-level user request. Loads the
    /// thread's latest checkpoint if one exists (to preserve message history and
    /// the authorized registry shape) and replaces any prior plan.
    #[instrument(skip(self, events, credentials))]
    pub async fn fresh_request(
        &self,
        thread_id: &str,
        request_text: &str,
        credentials: &std::collections::HashMap<String, String>,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> Result<(), GraphError> {
        if request_text.trim().is_empty() {
            return Err(GraphError::InvalidInput("request text is empty".to_string()));
        }

        let _guard = self.locks.acquire(thread_id).await;

        let registry = ToolRegistry::build(credentials)
            .map_err(|e| GraphError::InvalidInput(e.to_string()))?;

        let mut state = match self.checkpointer.get_latest(thread_id).await? {
            Some(cp) => serde_json::from_value::<GraphState>(cp.state)
                .map_err(|e| GraphError::Invariant(format!("corrupt checkpoint: {e}")))?,
            None => GraphState::fresh(thread_id, registry.clone()),
        };

        if state.awaiting_approval {
            return Err(GraphError::StateMismatch(
                "thread is awaiting approval; resume or retry before sending a new request"
                    .to_string(),
            ));
        }

        state.registry = registry;
        state.messages.push(Message::user(request_text));
        state.is_complete = false;
        state.last_error = None;
        state.applied_decision = None;

        let parent_id = self.checkpointer.get_latest(thread_id).await?.map(|c| c.checkpoint_id);

        self.plan_node(&mut state, parent_id, &events).await?;
        self.run_loop(state, &events).await
    }

    /// Apply a human decision to a suspended thread and continue execution.
    #[instrument(skip(self, events))]
    pub async fn resume(
        &self,
        thread_id: &str,
        action: ResumeAction,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> Result<(), GraphError> {
        let _guard = self.locks.acquire(thread_id).await;

        let cp = self
            .checkpointer
            .get_latest(thread_id)
            .await?
            .ok_or_else(|| no_checkpoint_error(thread_id))?;
        let mut state: GraphState = serde_json::from_value(cp.state)
            .map_err(|e| GraphError::Invariant(format!("corrupt checkpoint: {e}")))?;

        if interrupt::is_repeat(&state, &action) {
            emit_progress(&events, &state).await;
            if state.is_complete {
                emit(&events, RuntimeEvent::Done { final_message: last_assistant_message(&state) }).await;
            }
            return Ok(());
        }

        let step_number = interrupt::awaiting_step(&state)?.number;
        let action_label = action.label();

        {
            let step = state
                .plan
                .as_mut()
                .and_then(|p| p.step_mut(step_number))
                .expect("validated above");
            match action {
                ResumeAction::Approve => {
                    step.status = StepStatus::Pending;
                }
                ResumeAction::Skip => {
                    step.status = StepStatus::Skipped;
                }
                ResumeAction::Edit(payload) => {
                    step.preview = Some(payload);
                    step.status = StepStatus::Pending;
                }
            }
        }
        state.awaiting_approval = false;
        if action_label == "skip" {
            state.current_step = state.current_step.max(step_number) + 1;
        }
        state.applied_decision = Some(AppliedDecision {
            checkpoint_id: cp.checkpoint_id.clone(),
            step_number,
            action: action_label.to_string(),
        });

        self.checkpoint(&state, Some(cp.checkpoint_id), CheckpointSource::Router)
            .await?;
        self.run_loop(state, &events).await
    }

    /// Reopen `step_number` and every step after it, then continue execution. The
    /// caller names the step explicitly (rather than this runtime inferring "the
    /// failed one") so retrying a step outside the plan's range is a plain 400
    /// rather than a state-mismatch.
    #[instrument(skip(self, events))]
    pub async fn retry(
        &self,
        thread_id: &str,
        step_number: u32,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> Result<(), GraphError> {
        let _guard = self.locks.acquire(thread_id).await;

        let cp = self
            .checkpointer
            .get_latest(thread_id)
            .await?
            .ok_or_else(|| no_checkpoint_error(thread_id))?;
        let mut state: GraphState = serde_json::from_value(cp.state)
            .map_err(|e| GraphError::Invariant(format!("corrupt checkpoint: {e}")))?;

        let plan = state
            .plan
            .as_mut()
            .ok_or_else(|| GraphError::StateMismatch("thread has no plan to retry".to_string()))?;

        if plan.step(step_number).is_none() {
            return Err(GraphError::InvalidInput(format!(
                "step {step_number} is outside the plan's range 1..={}",
                plan.len()
            )));
        }

        for step in plan.steps.iter_mut().filter(|s| s.number >= step_number) {
            step.reopen();
        }
        state.last_error = None;
        state.awaiting_approval = false;
        state.current_step = step_number.saturating_sub(1);
        state.applied_decision = None;
        if let Some(plan) = state.plan.as_mut() {
            plan.is_complete = false;
        }
        state.is_complete = false;

        self.checkpoint(&state, Some(cp.checkpoint_id), CheckpointSource::Router)
            .await?;
        self.run_loop(state, &events).await
    }

    async fn plan_node(
        &self,
        state: &mut GraphState,
        parent_id: Option<String>,
        events: &mpsc::Sender<RuntimeEvent>,
    ) -> Result<(), GraphError> {
        emit(events, RuntimeEvent::Thinking { text: "planning".to_string() }).await;

        let tools = state.registry.all_tools().to_vec();
        let sink: TokenSink = None;
        let plan_result = self
            .gateway
            .plan(&state.messages.last().unwrap().content.clone(), &state.messages, &tools, sink)
            .await;

        let plan = match plan_result {
            Ok(p) => p,
            Err(e) => {
                state.last_error = Some(e.to_string());
                self.checkpoint(state, parent_id, CheckpointSource::Planner).await?;
                emit(events, RuntimeEvent::Error { category: e.category(), message: e.to_string() }).await;
                return Err(e);
            }
        };
        plan.validate()?;

        info!(step_count = plan.len(), "planner produced a plan");
        state.plan = Some(plan);
        state.current_step = 1;

        self.checkpoint(state, parent_id, CheckpointSource::Planner).await?;
        emit_progress(events, state).await;
        Ok(())
    }

    /// Drives the router/executor cycle until the thread suspends for approval,
    /// fails, or every step completes and the synthesizer runs.
    async fn run_loop(
        &self,
        mut state: GraphState,
        events: &mpsc::Sender<RuntimeEvent>,
    ) -> Result<(), GraphError> {
        loop {
            let latest_id = self.checkpointer.get_latest(&state.thread_id).await?.map(|c| c.checkpoint_id);

            let next = {
                let plan = state
                    .plan
                    .as_ref()
                    .ok_or_else(|| GraphError::Invariant("run_loop entered without a plan".to_string()))?;
                if state.current_step > plan.len() {
                    None
                } else {
                    Some(state.current_step)
                }
            };

            let Some(step_number) = next else {
                return self.synthesize(state, latest_id, events).await;
            };

            let tool_hints = state.plan.as_ref().unwrap().step(step_number).unwrap().expected_tool_ids.clone();
            let tools = state.registry.tools_for(&tool_hints);
            let mandatory = tools.iter().any(|t| t.approval_class.is_mandatory());
            let needs_approval = {
                let step = state.plan.as_ref().unwrap().step(step_number).unwrap();
                step.requires_approval || mandatory
            };

            if needs_approval {
                let step = state.plan.as_mut().unwrap().step_mut(step_number).unwrap();
                step.status = StepStatus::AwaitingApproval;
                if step.approval_reason.is_none() {
                    step.approval_reason = Some(if mandatory {
                        "this step uses a tool that requires confirmation".to_string()
                    } else {
                        "the plan marked this step for confirmation".to_string()
                    });
                }
                state.awaiting_approval = true;

                let descriptor = interrupt::descriptor_for(state.plan.as_ref().unwrap().step(step_number).unwrap());
                self.checkpoint(&state, latest_id, CheckpointSource::Router).await?;
                emit(events, RuntimeEvent::ApprovalRequired(descriptor)).await;
                return Ok(());
            }

            state.plan.as_mut().unwrap().step_mut(step_number).unwrap().status = StepStatus::InProgress;
            self.checkpoint(&state, latest_id, CheckpointSource::Router).await?;
            emit_progress(events, &state).await;

            let (tok_tx, mut tok_rx) = mpsc::channel::<String>(32);
            let forward_events = events.clone();
            let forward_step = step_number;
            let forward_task = tokio::spawn(async move {
                while let Some(text) = tok_rx.recv().await {
                    emit(&forward_events, RuntimeEvent::StepThinking { step: forward_step, text: text.clone() }).await;
                    emit(&forward_events, RuntimeEvent::Token { text }).await;
                }
            });

            let step_snapshot = state.plan.as_ref().unwrap().step(step_number).unwrap().clone();
            let outcome = self
                .gateway
                .execute_step(&step_snapshot, &state, &tools, Some(tok_tx))
                .await;
            let _ = forward_task.await;

            let prev_checkpoint = self.checkpointer.get_latest(&state.thread_id).await?.map(|c| c.checkpoint_id);
            let step = state.plan.as_mut().unwrap().step_mut(step_number).unwrap();
            let succeeded = match outcome {
                Ok(result) => {
                    step.status = StepStatus::Completed;
                    step.result = Some(result.result_text);
                    step.tool_outputs = result.tool_outputs;
                    step.rationale = Some(result.rationale);
                    true
                }
                Err(e) => {
                    step.status = StepStatus::Failed;
                    step.error = Some(e.to_string());
                    state.last_error = Some(e.to_string());
                    self.checkpoint(&state, prev_checkpoint, CheckpointSource::Executor).await?;
                    emit(events, RuntimeEvent::Error { category: e.category(), message: e.to_string() }).await;
                    return Err(e);
                }
            };

            if succeeded {
                state.current_step += 1;
            }
            self.checkpoint(&state, prev_checkpoint, CheckpointSource::Executor).await?;
            emit_progress(events, &state).await;
        }
    }

    async fn synthesize(
        &self,
        mut state: GraphState,
        parent_id: Option<String>,
        events: &mpsc::Sender<RuntimeEvent>,
    ) -> Result<(), GraphError> {
        let summary = state
            .plan
            .as_ref()
            .map(|p| {
                p.steps
                    .iter()
                    .filter_map(|s| s.result.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        state.messages.push(Message::assistant(summary.clone()));
        state.is_complete = true;
        if let Some(plan) = state.plan.as_mut() {
            plan.is_complete = true;
        }

        self.checkpoint(&state, parent_id, CheckpointSource::Synthesizer).await?;
        emit_progress(events, &state).await;
        emit(events, RuntimeEvent::Done { final_message: summary }).await;
        Ok(())
    }

    async fn checkpoint(
        &self,
        state: &GraphState,
        parent_id: Option<String>,
        source: CheckpointSource,
    ) -> Result<(), GraphError> {
        let value = serde_json::to_value(state)
            .map_err(|e| GraphError::Invariant(format!("state failed to serialize: {e}")))?;
        let checkpoint = Checkpoint::new(state.thread_id.clone(), parent_id, value, CheckpointMetadata::new(source));
        self.checkpointer.put(checkpoint).await?;
        Ok(())
    }
}

fn no_checkpoint_error(thread_id: &str) -> GraphError {
    GraphError::StateMismatch(format!("no checkpoint exists for thread {thread_id}"))
}

fn last_assistant_message(state: &GraphState) -> String {
    state
        .messages
        .iter()
        .rev()
        .find(|m| matches!(m.role, crate::types::MessageRole::Assistant))
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use workflow_checkpoint::memory::InMemoryCheckpointSaver;

    use crate::llm::StepOutcome;
    use crate::types::{Plan, Step};

    struct ScriptedGateway;

    #[async_trait]
    impl LlmGateway for ScriptedGateway {
        async fn plan(
            &self,
            _request: &str,
            _history: &[Message],
            _tools: &[workflow_registry::Tool],
            _tokens: TokenSink,
        ) -> Result<Plan, GraphError> {
            Ok(Plan::new("do a thing", "single step plan", vec![Step::new(1, "say hi")]))
        }

        async fn execute_step(
            &self,
            _step: &Step,
            _state: &GraphState,
            _tools: &[workflow_registry::Tool],
            _tokens: TokenSink,
        ) -> Result<StepOutcome, GraphError> {
            Ok(StepOutcome {
                result_text: "hi".to_string(),
                tool_outputs: None,
                rationale: "greeted".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn fresh_request_runs_to_completion_without_approval() {
        let runtime = GraphRuntime::new(Arc::new(InMemoryCheckpointSaver::default()), Arc::new(ScriptedGateway));
        let (tx, mut rx) = mpsc::channel(32);
        let creds = std::collections::HashMap::new();

        runtime.fresh_request("t1", "say hi", &creds, tx).await.unwrap();

        let mut saw_done = false;
        while let Some(event) = rx.recv().await {
            if let RuntimeEvent::Done { final_message } = event {
                assert_eq!(final_message, "hi");
                saw_done = true;
            }
        }
        assert!(saw_done);
    }

    #[tokio::test]
    async fn fresh_request_rejects_empty_text() {
        let runtime = GraphRuntime::new(Arc::new(InMemoryCheckpointSaver::default()), Arc::new(ScriptedGateway));
        let (tx, _rx) = mpsc::channel(32);
        let creds = std::collections::HashMap::new();
        let result = runtime.fresh_request("t1", "   ", &creds, tx).await;
        assert!(result.is_err());
    }

    struct ApprovalGateway;

    #[async_trait]
    impl LlmGateway for ApprovalGateway {
        async fn plan(
            &self,
            _request: &str,
            _history: &[Message],
            _tools: &[workflow_registry::Tool],
            _tokens: TokenSink,
        ) -> Result<Plan, GraphError> {
            let mut step = Step::new(1, "send the email");
            step.requires_approval = true;
            Ok(Plan::new("send an email", "one step, needs approval", vec![step]))
        }

        async fn execute_step(
            &self,
            _step: &Step,
            _state: &GraphState,
            _tools: &[workflow_registry::Tool],
            _tokens: TokenSink,
        ) -> Result<StepOutcome, GraphError> {
            Ok(StepOutcome {
                result_text: "sent".to_string(),
                tool_outputs: None,
                rationale: "sent the email".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn repeated_resume_with_the_same_action_is_a_no_op() {
        let checkpointer = Arc::new(InMemoryCheckpointSaver::default());
        let runtime = GraphRuntime::new(checkpointer.clone(), Arc::new(ApprovalGateway));
        let creds = std::collections::HashMap::new();

        let (tx, mut rx) = mpsc::channel(32);
        runtime.fresh_request("t1", "send an email", &creds, tx).await.unwrap();
        while rx.recv().await.is_some() {}

        let (tx, mut rx) = mpsc::channel(32);
        runtime.resume("t1", ResumeAction::Approve, tx).await.unwrap();
        while rx.recv().await.is_some() {}

        let after_first = checkpointer.get_latest("t1").await.unwrap().unwrap().checkpoint_id;

        let (tx, mut rx) = mpsc::channel(32);
        runtime.resume("t1", ResumeAction::Approve, tx).await.unwrap();
        let mut saw_progress = false;
        while let Some(event) = rx.recv().await {
            if matches!(event, RuntimeEvent::Progress { .. }) {
                saw_progress = true;
            }
        }
        assert!(saw_progress);

        let after_second = checkpointer.get_latest("t1").await.unwrap().unwrap().checkpoint_id;
        assert_eq!(after_first, after_second, "a repeat resume must not create a new checkpoint");
    }

    #[tokio::test]
    async fn current_step_advances_past_the_plan_once_the_last_step_completes() {
        let runtime = GraphRuntime::new(Arc::new(InMemoryCheckpointSaver::default()), Arc::new(ScriptedGateway));
        let (tx, mut rx) = mpsc::channel(32);
        let creds = std::collections::HashMap::new();

        runtime.fresh_request("t1", "say hi", &creds, tx).await.unwrap();

        let mut last_progress_step = None;
        while let Some(event) = rx.recv().await {
            if let RuntimeEvent::Progress { current_step, .. } = event {
                last_progress_step = Some(current_step);
            }
        }
        assert_eq!(last_progress_step, Some(2));
    }
}
