//! Thread-keyed checkpoint storage for the graph runtime.
//!
//! A checkpoint is an immutable snapshot of one thread's [`checkpoint::Checkpoint`]
//! state, captured after a single graph-runtime node transition. Checkpoints for a
//! thread form a linked list by `parent_checkpoint_id`; there is no generic
//! multi-channel state model here, because every graph in this engine shares one
//! fixed state shape.
//!
//! Two backends implement [`CheckpointSaver`]:
//!
//! - [`memory::InMemoryCheckpointSaver`] - process-local, for development and tests.
//! - [`sqlite::SqliteCheckpointSaver`] - durable, for production deployments.
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use workflow_checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSaver, CheckpointSource, memory::InMemoryCheckpointSaver};
//!
//! let saver = InMemoryCheckpointSaver::new();
//! let checkpoint = Checkpoint::new(
//!     "thread-1",
//!     None,
//!     serde_json::json!({"current_step": 1}),
//!     CheckpointMetadata::new(CheckpointSource::Planner),
//! );
//! saver.put(checkpoint).await?;
//! let latest = saver.get_latest("thread-1").await?;
//! assert!(latest.is_some());
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSource, PendingWrite};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointSaver;
pub use sqlite::SqliteCheckpointSaver;
pub use traits::CheckpointSaver;
