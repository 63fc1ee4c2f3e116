//! Extensible checkpoint storage trait for custom backend implementations
//!
//! [`CheckpointSaver`] is the seam between the graph runtime and durability. Two
//! backends implement it in this crate: [`crate::memory::InMemoryCheckpointSaver`]
//! (process-local) and [`crate::sqlite::SqliteCheckpointSaver`] (durable). Both are
//! interchangeable from the runtime's point of view; it only ever holds a
//! `Box<dyn CheckpointSaver>` / `Arc<dyn CheckpointSaver>`.
//!
//! # Contract
//!
//! - `put` is atomic and returns only after the write is durable for that backend.
//! - `get_latest` returns the newest checkpoint for a thread, or `None` for a thread
//!   that has never been written.
//! - `list` returns every checkpoint for a thread, newest first, for history
//!   reconstruction.
//! - Writes to the same thread are serialized by the backend (or fail with
//!   [`crate::error::CheckpointError::Conflict`]); writes to different threads may
//!   proceed independently.
//! - `put_writes` records partial writes that happen mid-transition, before the
//!   node's checkpoint is committed. Backends that don't need partial-write tracking
//!   (e.g. the in-memory one) may implement it as a no-op that still satisfies the
//!   trait.

use async_trait::async_trait;

use crate::checkpoint::{Checkpoint, PendingWrite};
use crate::error::Result;

/// Persists and retrieves graph-state checkpoints, keyed by thread.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Durably write a new checkpoint for `checkpoint.thread_id`, linked to
    /// `checkpoint.parent_checkpoint_id`. Returns once the write is acknowledged.
    async fn put(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Retrieve the most recently written checkpoint for `thread_id`, if any.
    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Retrieve a specific checkpoint by id, if it exists for `thread_id`.
    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>>;

    /// List every checkpoint for a thread, newest first.
    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>>;

    /// Record partial writes produced mid-transition, before the transition's own
    /// checkpoint is committed via `put`.
    async fn put_writes(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        writes: Vec<PendingWrite>,
    ) -> Result<()>;

    /// Delete every checkpoint and pending write for a thread.
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    /// A short, human-readable name for the backend kind, used in health reporting
    /// and startup logs (e.g. `"in_memory"`, `"sqlite"`).
    fn backend_kind(&self) -> &'static str;
}
