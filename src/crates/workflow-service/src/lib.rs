//! HTTP surface and SSE streaming for the workflow graph runtime.
//!
//! Thin layer over [`workflow_core::GraphRuntime`]: [`service::WorkflowService`]
//! owns the runtime's dependencies and translates its events into the wire
//! protocol in [`events`]; [`api`] exposes that over axum.

pub mod api;
pub mod config;
pub mod events;
pub mod metadata;
pub mod service;

pub use config::ServiceConfig;
pub use events::StreamFrame;
pub use metadata::{ConversationMetadataHook, InMemoryConversationMetadataHook};
pub use service::WorkflowService;
