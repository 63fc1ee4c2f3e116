//! Per-thread advisory locking.
//!
//! The runtime is already strictly sequential within one request: a fresh-request,
//! resume, or retry call runs its node transitions one after another, never
//! concurrently. The lock's job is to stop a *second* call for the same thread
//! (e.g. a resume racing a still-streaming fresh request) from interleaving with the
//! first. It is held for the whole `run_loop`, not re-acquired per node.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Lazily creates one mutex per thread id and hands out guards for it.
#[derive(Default)]
pub struct ThreadLockRegistry {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `thread_id`, blocking until any other in-flight call for
    /// the same thread releases it. The returned guard holds the lock until dropped.
    pub async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let read = self.locks.read().await;
            if let Some(m) = read.get(thread_id) {
                m.clone()
            } else {
                drop(read);
                let mut write = self.locks.write().await;
                write
                    .entry(thread_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            }
        };

        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn sequential_acquisitions_on_the_same_thread_do_not_deadlock() {
        let registry = ThreadLockRegistry::new();
        {
            let _g = registry.acquire("t1").await;
        }
        let _g2 = registry.acquire("t1").await;
    }

    #[tokio::test]
    async fn different_threads_do_not_block_each_other() {
        let registry = Arc::new(ThreadLockRegistry::new());
        let a = registry.clone();
        let b = registry.clone();

        let ta = tokio::spawn(async move {
            let _g = a.acquire("t1").await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        });
        let tb = tokio::spawn(async move {
            let _g = b.acquire("t2").await;
        });

        let (ra, rb) = tokio::join!(ta, tb);
        ra.unwrap();
        rb.unwrap();
    }

    #[tokio::test]
    async fn a_second_acquire_on_the_same_thread_waits_for_the_first_to_drop() {
        let registry = Arc::new(ThreadLockRegistry::new());
        let guard = registry.acquire("t1").await;

        let registry2 = registry.clone();
        let waiter = tokio::spawn(async move {
            let _g = registry2.acquire("t1").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }
}
