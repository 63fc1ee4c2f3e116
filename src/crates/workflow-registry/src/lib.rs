//! Per-request tool registry.
//!
//! Produced once per request from a bag of caller-supplied bearer tokens. Enumerates
//! the integrations and tools the caller is authorized to use, with display metadata
//! and the approval class that governs whether a step invoking a tool needs human
//! sign-off before it runs.

pub mod error;
pub mod registry;
pub mod types;

pub use error::{RegistryError, Result};
pub use registry::ToolRegistry;
pub use types::{ApprovalClass, Integration, Tool};
