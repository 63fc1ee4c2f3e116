//! API route definitions.

use std::sync::Arc;

use axum::http::HeaderName;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::service::WorkflowService;

use super::handlers;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WorkflowService>,
}

pub fn create_router(service: Arc<WorkflowService>) -> Router {
    let state = AppState { service };
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/chat/stream", post(handlers::chat_stream))
        .route("/chat/resume", post(handlers::resume))
        .route("/chat/retry", post(handlers::retry))
        .route("/chat/history/:thread_id", get(handlers::history))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
