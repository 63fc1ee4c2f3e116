//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint exists yet for the requested thread
    #[error("no checkpoint found for thread: {0}")]
    NotFound(String),

    /// Graph state failed to serialize or deserialize
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The durable backend rejected a read or write
    #[error("storage error: {0}")]
    Storage(String),

    /// Two writers raced for the same thread; the caller must surface this as fatal
    #[error("concurrent write conflict for thread {0}")]
    Conflict(String),

    /// Checkpoint data was structurally invalid (bad parent link, missing field)
    #[error("invalid checkpoint: {0}")]
    Invalid(String),
}

impl CheckpointError {
    /// True when a different writer committed a checkpoint for this thread concurrently.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CheckpointError::Conflict(_))
    }

    /// True when the error reflects an absent thread rather than a storage fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CheckpointError::NotFound(_))
    }
}
