//! Per-user write serialization.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::types::UserId;

/// Registry of per-user advisory locks.
///
/// Position-mutating operations hold their user's lock for the whole
/// read-shift-write sequence, so overlapping calls for one user cannot
/// interleave. Locks for distinct users are independent.
#[derive(Debug, Default)]
pub(crate) struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    /// Create an empty registry.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one user, creating it on first use.
    ///
    /// Entries nobody holds or waits on are pruned here, so the
    /// registry only tracks users with an operation in flight.
    pub(crate) async fn acquire(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            let lock = Arc::clone(locks.entry(user_id).or_default());
            // Holders and waiters keep a clone of the Arc; a count of
            // one means only the registry still references the lock.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            lock
        };
        lock.lock_owned().await
    }
}
