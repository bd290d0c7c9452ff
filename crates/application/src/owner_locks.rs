use std::collections::HashMap;
use std::sync::Arc;

use keygate_domain::EdgeOwner;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-owner write serialization shared by the assignment and bulk services.
///
/// Writes to different owners proceed in parallel. Entries nobody holds are
/// pruned on the next acquisition.
#[derive(Debug, Default)]
pub struct OwnerLocks {
    locks: Mutex<HashMap<EdgeOwner, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive write access to one owner's edge set.
    pub async fn acquire(&self, owner: EdgeOwner) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|key, lock| *key == owner || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(owner).or_default())
        };

        lock.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) async fn tracked_owners(&self) -> usize {
        self.locks.lock().await.len()
    }
}
