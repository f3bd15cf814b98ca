//! Per-sender mutual exclusion.
//!
//! A dispatch holds its sender's lock from the first state check to the last
//! state write, so two messages from one sender are processed one after the
//! other while different senders proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct SenderLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SenderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `sender`; released when the guard drops.
    pub async fn acquire(&self, sender: &str) -> SenderGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(sender.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        SenderGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Drops entries nobody holds or waits on.
    pub async fn cleanup_unused(&self) {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

pub struct SenderGuard {
    _guard: OwnedMutexGuard<()>,
}
