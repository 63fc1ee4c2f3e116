//! In-memory checkpoint storage for development and testing
//!
//! [`InMemoryCheckpointSaver`] keeps every checkpoint in a process-local map. It is
//! the default backend when no database URL is configured (per the checkpointer's
//! failure policy, selecting it is a startup fallback, not silent data loss — a
//! caller that wants durability across restarts must configure the SQLite backend).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::checkpoint::{Checkpoint, PendingWrite};
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointSaver;

#[derive(Default)]
struct ThreadLog {
    checkpoints: Vec<Checkpoint>,
    writes: Vec<(String, Vec<PendingWrite>)>,
}

/// Process-local `CheckpointSaver`. Not shared across processes; lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointSaver {
    threads: Arc<RwLock<HashMap<String, ThreadLog>>>,
}

impl InMemoryCheckpointSaver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut threads = self.threads.write().await;
        let log = threads.entry(checkpoint.thread_id.clone()).or_default();

        if let Some(parent) = &checkpoint.parent_checkpoint_id {
            let parent_exists = log.checkpoints.iter().any(|c| &c.checkpoint_id == parent);
            if !parent_exists {
                return Err(CheckpointError::Invalid(format!(
                    "parent checkpoint {parent} not found for thread {}",
                    checkpoint.thread_id
                )));
            }
        }

        log.checkpoints.push(checkpoint);
        Ok(())
    }

    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .and_then(|log| log.checkpoints.last().cloned()))
    }

    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).and_then(|log| {
            log.checkpoints
                .iter()
                .find(|c| c.checkpoint_id == checkpoint_id)
                .cloned()
        }))
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let threads = self.threads.read().await;
        let mut checkpoints = threads
            .get(thread_id)
            .map(|log| log.checkpoints.clone())
            .unwrap_or_default();
        checkpoints.reverse();
        Ok(checkpoints)
    }

    async fn put_writes(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        writes: Vec<PendingWrite>,
    ) -> Result<()> {
        let mut threads = self.threads.write().await;
        let log = threads.entry(thread_id.to_string()).or_default();
        log.writes.push((checkpoint_id.to_string(), writes));
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads.remove(thread_id);
        Ok(())
    }

    fn backend_kind(&self) -> &'static str {
        "in_memory"
    }
}
