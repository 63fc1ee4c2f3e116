//! HTTP-facing error taxonomy.
//!
//! Maps the runtime's [`workflow_core::GraphError`] categories onto status codes:
//! input and not-found errors are 400/404, state-mismatch is 409, planner and
//! execution failures surface as 500 with the category preserved for the client,
//! and checkpointer errors are always fatal 500s.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub category: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<workflow_core::GraphError> for ApiError {
    fn from(err: workflow_core::GraphError) -> Self {
        use workflow_core::GraphError::*;
        match err {
            InvalidInput(msg) => ApiError::BadRequest(msg),
            StateMismatch(msg) => ApiError::Conflict(msg),
            Planner(msg) => ApiError::Internal(format!("planner: {msg}")),
            Execution(msg) => ApiError::Internal(format!("execution: {msg}")),
            Checkpointer(e) => ApiError::Internal(format!("checkpointer: {e}")),
            Invariant(msg) => ApiError::Internal(format!("invariant: {msg}")),
        }
    }
}

impl From<workflow_registry::RegistryError> for ApiError {
    fn from(err: workflow_registry::RegistryError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(category = self.category(), error = %self, "request failed");
        } else {
            tracing::warn!(category = self.category(), error = %self, "request rejected");
        }

        let body = ApiErrorBody {
            error: self.to_string(),
            category: self.category().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
