//! Checkpoint data structures
//!
//! A checkpoint is an immutable snapshot of a thread's graph state, captured after
//! one graph-runtime node transition. Checkpoints for a thread form a linked list by
//! `parent_checkpoint_id`, newest first; there is exactly one root (no parent) per
//! thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identifies which node produced a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointSource {
    Planner,
    Router,
    Executor,
    Synthesizer,
}

impl CheckpointSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointSource::Planner => "planner",
            CheckpointSource::Router => "router",
            CheckpointSource::Executor => "executor",
            CheckpointSource::Synthesizer => "synthesizer",
        }
    }
}

/// Metadata attached to a checkpoint, separate from the graph state payload itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Node that produced this checkpoint.
    pub source: CheckpointSource,
    /// Wall-clock time the checkpoint was written.
    pub created_at: DateTime<Utc>,
}

impl CheckpointMetadata {
    pub fn new(source: CheckpointSource) -> Self {
        Self {
            source,
            created_at: Utc::now(),
        }
    }
}

/// An immutable snapshot: a thread id, a checkpoint id, a link to its parent (if any),
/// the graph state payload at this point, and metadata about how it was produced.
///
/// `state` is stored as [`serde_json::Value`] rather than a generic type parameter:
/// every graph in this engine shares one fixed state shape (`GraphState` in
/// `workflow-core`), so there is no channel system to generalize over here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub checkpoint_id: String,
    pub parent_checkpoint_id: Option<String>,
    pub state: Value,
    pub metadata: CheckpointMetadata,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        parent_checkpoint_id: Option<String>,
        state: Value,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id: Uuid::new_v4().to_string(),
            parent_checkpoint_id,
            state,
            metadata,
        }
    }
}

/// A single partial write recorded mid-transition, before the node's final checkpoint
/// is committed. Mirrors the `checkpoint_writes` table from the external interface
/// contract: `(thread_id, checkpoint_id, task_id, seq, channel, payload)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingWrite {
    pub task_id: String,
    pub seq: i64,
    pub channel: String,
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_gets_a_fresh_id_each_time() {
        let meta = CheckpointMetadata::new(CheckpointSource::Planner);
        let a = Checkpoint::new("t1", None, serde_json::json!({}), meta.clone());
        let b = Checkpoint::new("t1", None, serde_json::json!({}), meta);
        assert_ne!(a.checkpoint_id, b.checkpoint_id);
    }

    #[test]
    fn source_as_str_round_trips_through_serde() {
        let meta = CheckpointMetadata::new(CheckpointSource::Executor);
        assert_eq!(meta.source.as_str(), "executor");
    }
}
