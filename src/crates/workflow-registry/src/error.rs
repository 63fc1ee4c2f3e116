//! Error types for tool registry construction and lookup.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// A step referenced a tool id the registry has never heard of.
    #[error("unknown tool id: {0}")]
    UnknownTool(String),

    /// A caller-supplied credential bag was structurally invalid (not a string map).
    #[error("invalid credentials payload: {0}")]
    InvalidCredentials(String),
}
