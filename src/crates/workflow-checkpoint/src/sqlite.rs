//! Durable checkpoint storage backed by SQLite.
//!
//! Schema setup runs once on its own non-transactional connection, acquired
//! before the pool is built for normal traffic: `CREATE TABLE IF NOT EXISTS` is
//! idempotent, so concurrent startups racing to create the schema are harmless,
//! but running it inside the same transactional connection pool as regular reads
//! and writes would let a DDL statement interleave with live DML.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Connection, Row, SqlitePool};
use std::str::FromStr;

use crate::checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSource, PendingWrite};
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointSaver;

const CREATE_CHECKPOINTS: &str = r#"
CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id TEXT NOT NULL,
    checkpoint_id TEXT NOT NULL,
    parent_checkpoint_id TEXT,
    state TEXT NOT NULL,
    source TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (thread_id, checkpoint_id)
)
"#;

const CREATE_CHECKPOINT_WRITES: &str = r#"
CREATE TABLE IF NOT EXISTS checkpoint_writes (
    thread_id TEXT NOT NULL,
    checkpoint_id TEXT NOT NULL,
    task_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    channel TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (thread_id, checkpoint_id, task_id, seq)
)
"#;

const CREATE_CHECKPOINTS_BY_THREAD: &str =
    "CREATE INDEX IF NOT EXISTS idx_checkpoints_thread ON checkpoints (thread_id, created_at)";

pub struct SqliteCheckpointSaver {
    pool: SqlitePool,
}

impl SqliteCheckpointSaver {
    /// Connects to `database_url`, creating the file if it doesn't exist, runs
    /// idempotent schema setup on a dedicated connection, then opens the pool
    /// used for all subsequent transactional traffic.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| CheckpointError::Storage(e.to_string()))?
            .create_if_missing(true);

        let mut setup_conn = sqlx::sqlite::SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        sqlx::query(CREATE_CHECKPOINTS)
            .execute(&mut setup_conn)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        sqlx::query(CREATE_CHECKPOINT_WRITES)
            .execute(&mut setup_conn)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        sqlx::query(CREATE_CHECKPOINTS_BY_THREAD)
            .execute(&mut setup_conn)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        drop(setup_conn);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        tracing::info!(backend = "sqlite", "checkpoint schema ready");
        Ok(Self { pool })
    }

    fn row_to_checkpoint(
        thread_id: String,
        checkpoint_id: String,
        parent_checkpoint_id: Option<String>,
        state: String,
        source: String,
        created_at: String,
    ) -> Result<Checkpoint> {
        let state: Value = serde_json::from_str(&state)?;
        let source = match source.as_str() {
            "planner" => CheckpointSource::Planner,
            "router" => CheckpointSource::Router,
            "executor" => CheckpointSource::Executor,
            "synthesizer" => CheckpointSource::Synthesizer,
            other => return Err(CheckpointError::Invalid(format!("unknown source {other}"))),
        };
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| CheckpointError::Invalid(e.to_string()))?
            .with_timezone(&chrono::Utc);

        Ok(Checkpoint {
            thread_id,
            checkpoint_id,
            parent_checkpoint_id,
            state,
            metadata: CheckpointMetadata { source, created_at },
        })
    }
}

#[async_trait]
impl CheckpointSaver for SqliteCheckpointSaver {
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let state = serde_json::to_string(&checkpoint.state)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        if let Some(parent) = &checkpoint.parent_checkpoint_id {
            let exists: Option<(String,)> = sqlx::query_as(
                "SELECT checkpoint_id FROM checkpoints WHERE thread_id = ? AND checkpoint_id = ?",
            )
            .bind(&checkpoint.thread_id)
            .bind(parent)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;

            if exists.is_none() {
                return Err(CheckpointError::Invalid(format!(
                    "parent checkpoint {parent} not found for thread {}",
                    checkpoint.thread_id
                )));
            }
        }

        let result = sqlx::query(
            "INSERT INTO checkpoints (thread_id, checkpoint_id, parent_checkpoint_id, state, source, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&checkpoint.thread_id)
        .bind(&checkpoint.checkpoint_id)
        .bind(&checkpoint.parent_checkpoint_id)
        .bind(&state)
        .bind(checkpoint.metadata.source.as_str())
        .bind(checkpoint.metadata.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {
                tx.commit().await.map_err(|e| CheckpointError::Storage(e.to_string()))?;
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(CheckpointError::Conflict(checkpoint.thread_id))
            }
            Err(e) => Err(CheckpointError::Storage(e.to_string())),
        }
    }

    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            "SELECT thread_id, checkpoint_id, parent_checkpoint_id, state, source, created_at FROM checkpoints WHERE thread_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(Self::row_to_checkpoint(
            row.get("thread_id"),
            row.get("checkpoint_id"),
            row.get("parent_checkpoint_id"),
            row.get("state"),
            row.get("source"),
            row.get("created_at"),
        )?))
    }

    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            "SELECT thread_id, checkpoint_id, parent_checkpoint_id, state, source, created_at FROM checkpoints WHERE thread_id = ? AND checkpoint_id = ?",
        )
        .bind(thread_id)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(Self::row_to_checkpoint(
            row.get("thread_id"),
            row.get("checkpoint_id"),
            row.get("parent_checkpoint_id"),
            row.get("state"),
            row.get("source"),
            row.get("created_at"),
        )?))
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let rows = sqlx::query(
            "SELECT thread_id, checkpoint_id, parent_checkpoint_id, state, source, created_at FROM checkpoints WHERE thread_id = ? ORDER BY created_at DESC",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Self::row_to_checkpoint(
                    row.get("thread_id"),
                    row.get("checkpoint_id"),
                    row.get("parent_checkpoint_id"),
                    row.get("state"),
                    row.get("source"),
                    row.get("created_at"),
                )
            })
            .collect()
    }

    async fn put_writes(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        writes: Vec<PendingWrite>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        for write in writes {
            let payload = serde_json::to_string(&write.payload)?;
            sqlx::query(
                "INSERT OR REPLACE INTO checkpoint_writes (thread_id, checkpoint_id, task_id, seq, channel, payload) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(thread_id)
            .bind(checkpoint_id)
            .bind(&write.task_id)
            .bind(write.seq)
            .bind(&write.channel)
            .bind(payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| CheckpointError::Storage(e.to_string()))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        sqlx::query("DELETE FROM checkpoint_writes WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;

        tx.commit().await.map_err(|e| CheckpointError::Storage(e.to_string()))
    }

    fn backend_kind(&self) -> &'static str {
        "sqlite"
    }
}
