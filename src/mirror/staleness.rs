//! Process-wide record of when each store was last synced.
//!
//! The map lives only in memory: after a restart every store is stale again.
//! Callers that check-then-sync must hold the store's lock from
//! [`StalenessCache::lock_store`] so concurrent requests for the same store
//! run at most one sync. Every finished sync bumps the store's
//! [`SyncAttempt::generation`]; a caller that read the generation before
//! queueing on the lock and finds it changed once inside reuses that sync.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// The most recent finished sync of one store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncAttempt {
    /// Number of syncs finished so far; 0 means none.
    pub generation: u64,
    /// Every collection of that sync was fetched to the end.
    pub complete: bool,
}

pub struct StalenessCache {
    ttl: Duration,
    last_synced: Mutex<HashMap<String, DateTime<Utc>>>,
    attempts: Mutex<HashMap<String, SyncAttempt>>,
    store_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StalenessCache {
    pub const DEFAULT_TTL_MINUTES: u64 = 5;

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last_synced: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            store_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl_minutes(minutes: u64) -> Self {
        Self::new(Duration::minutes(minutes as i64))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// True if the store never synced or its last sync is older than the TTL.
    pub fn should_sync(&self, store_id: &str) -> bool {
        self.should_sync_at(store_id, Utc::now())
    }

    pub fn should_sync_at(&self, store_id: &str, now: DateTime<Utc>) -> bool {
        match self.last_synced(store_id) {
            None => true,
            Some(synced_at) => now - synced_at > self.ttl,
        }
    }

    /// Record a finished sync while holding the store lock.
    ///
    /// `settled` syncs reached the upstream for every collection and move
    /// the staleness timestamp; the others only bump the generation so that
    /// queued callers do not repeat them.
    pub fn record_attempt(&self, store_id: &str, settled: bool, complete: bool) -> SyncAttempt {
        if settled {
            self.mark_synced(store_id);
        }
        let mut attempts = self.attempts.lock().unwrap();
        let attempt = attempts.entry(store_id.to_string()).or_default();
        attempt.generation += 1;
        attempt.complete = complete;
        *attempt
    }

    pub fn last_attempt(&self, store_id: &str) -> SyncAttempt {
        self.attempts
            .lock()
            .unwrap()
            .get(store_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn mark_synced(&self, store_id: &str) {
        self.mark_synced_at(store_id, Utc::now());
    }

    pub fn mark_synced_at(&self, store_id: &str, at: DateTime<Utc>) {
        self.last_synced
            .lock()
            .unwrap()
            .insert(store_id.to_string(), at);
    }

    pub fn last_synced(&self, store_id: &str) -> Option<DateTime<Utc>> {
        self.last_synced.lock().unwrap().get(store_id).copied()
    }

    /// Acquire the per-store sync lock. Different stores never contend.
    pub async fn lock_store(&self, store_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.store_locks.lock().unwrap();
            locks
                .entry(store_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

impl Default for StalenessCache {
    fn default() -> Self {
        Self::with_ttl_minutes(Self::DEFAULT_TTL_MINUTES)
    }
}
