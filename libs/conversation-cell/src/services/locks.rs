use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per user id. Messages from the same user are handled in
/// arrival order; different users never wait on each other.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries only the map refers to are neither held nor awaited.
            locks.retain(|id, lock| id == user_id || Arc::strong_count(lock) > 1);
            locks.entry(user_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn tracked_users(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}
