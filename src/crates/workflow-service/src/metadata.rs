//! Conversation-metadata side channel.
//!
//! The graph runtime has no notion of a conversation's display title; it only
//! ever sees a thread id and message history. The metadata hook is the seam
//! the service uses to record that title out of band, the first time a
//! brand-new thread's progress is observed. Mirrors [`workflow_checkpoint::CheckpointSaver`]'s
//! shape: a trait plus a process-local default, injected behind an `Arc`.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

const TITLE_MAX_CHARS: usize = 100;

/// One conversation's display metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMetadata {
    pub thread_id: String,
    pub title: String,
}

/// Records a conversation's metadata the first time it is seen. Implementations
/// must be best-effort idempotent: recording a thread id that already has a
/// record leaves the existing record in place.
#[async_trait]
pub trait ConversationMetadataHook: Send + Sync {
    async fn record_if_absent(&self, thread_id: &str, title: &str);
}

/// Process-local hook. Not shared across processes or durable across restarts;
/// a production deployment would back this with the same store as conversation
/// history.
#[derive(Default)]
pub struct InMemoryConversationMetadataHook {
    seen: Mutex<HashSet<String>>,
    records: Mutex<Vec<ConversationMetadata>>,
}

impl InMemoryConversationMetadataHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<ConversationMetadata> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ConversationMetadataHook for InMemoryConversationMetadataHook {
    async fn record_if_absent(&self, thread_id: &str, title: &str) {
        let mut seen = self.seen.lock().await;
        if !seen.insert(thread_id.to_string()) {
            return;
        }
        self.records.lock().await.push(ConversationMetadata {
            thread_id: thread_id.to_string(),
            title: title.to_string(),
        });
    }
}

/// The first 100 characters of `text`, used as a conversation's title.
/// Truncates on a `char` boundary so multi-byte UTF-8 input is never split
/// mid-codepoint.
pub fn derive_title(text: &str) -> String {
    text.chars().take(TITLE_MAX_CHARS).collect()
}
