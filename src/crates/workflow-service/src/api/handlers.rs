//! HTTP handler functions for the chat surface.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use futures::StreamExt as _;
use tokio_stream::wrappers::ReceiverStream;

use workflow_core::types::{Message, PlanView};

use super::error::ApiError;
use super::routes::AppState;
use crate::events::StreamFrame;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub thread_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub thread_id: String,
    pub action: String,
    #[serde(default)]
    pub content: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RetryRequest {
    pub thread_id: String,
    pub step_number: u32,
}

/// The response shape shared by `/chat`, `/chat/resume`, and `/chat/retry`
/// once a run has either completed or suspended for approval.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub plan: Option<PlanView>,
    pub is_complete: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub plan: Option<PlanView>,
    pub messages: Vec<Message>,
    pub current_step_index: u32,
    pub loaded_integrations: Vec<workflow_registry::Integration>,
}

/// GET /healthz
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "checkpointer": state.service.checkpointer_backend(),
    }))
}

/// POST /chat — runs a fresh request to completion (or suspension), draining
/// every frame it produced internally, and returns the resulting snapshot
/// instead of the frames themselves. Clients that want progressive updates use
/// `/chat/stream` instead.
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Result<impl IntoResponse, ApiError> {
    let thread_id = req.thread_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let rx = state.service.stream_fresh_request(thread_id.clone(), req.text, req.credentials).await?;
    drain(rx).await;

    let final_state = state.service.latest_state(&thread_id).await?;
    Ok(Json(RunResponse {
        thread_id: Some(thread_id),
        plan: final_state.plan.as_ref().map(PlanView::from_plan),
        is_complete: final_state.is_complete,
    }))
}

/// POST /chat/stream — same as `/chat` but emitted as a live SSE stream.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let thread_id = req.thread_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let rx = state.service.stream_fresh_request(thread_id, req.text, req.credentials).await?;
    Ok(sse_from(rx))
}

/// POST /chat/resume
pub async fn resume(State(state): State<AppState>, Json(req): Json<ResumeRequest>) -> Result<impl IntoResponse, ApiError> {
    let thread_id = req.thread_id;
    let rx = state.service.stream_resume(thread_id.clone(), &req.action, req.content).await?;
    drain(rx).await;

    let final_state = state.service.latest_state(&thread_id).await?;
    Ok(Json(RunResponse {
        thread_id: None,
        plan: final_state.plan.as_ref().map(PlanView::from_plan),
        is_complete: final_state.is_complete,
    }))
}

/// POST /chat/retry
pub async fn retry(State(state): State<AppState>, Json(req): Json<RetryRequest>) -> Result<impl IntoResponse, ApiError> {
    let thread_id = req.thread_id;
    let rx = state.service.stream_retry(thread_id.clone(), req.step_number).await?;
    drain(rx).await;

    let final_state = state.service.latest_state(&thread_id).await?;
    Ok(Json(RunResponse {
        thread_id: None,
        plan: final_state.plan.as_ref().map(PlanView::from_plan),
        is_complete: final_state.is_complete,
    }))
}

/// GET /chat/history/:thread_id
pub async fn history(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let graph_state = state.service.latest_state(&thread_id).await?;
    Ok(Json(HistoryResponse {
        plan: graph_state.plan.as_ref().map(PlanView::from_plan),
        messages: graph_state.messages,
        current_step_index: graph_state.current_step,
        loaded_integrations: graph_state.registry.integrations().to_vec(),
    }))
}

fn sse_from(rx: tokio::sync::mpsc::Receiver<StreamFrame>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(rx).map(|frame| Ok(Event::default().event(frame.frame_type()).data(frame.to_sse_data())));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn drain(rx: tokio::sync::mpsc::Receiver<StreamFrame>) {
    ReceiverStream::new(rx).for_each(|_| async {}).await;
}
