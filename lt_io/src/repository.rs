//! Shared store of the latest check outcome per app.
//!
//! Entries are spread over a fixed number of independently locked shards so
//! concurrent writers for different apps rarely contend.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use lt_core::CheckOutcome;

const DEFAULT_SHARDS: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryEntry {
    pub outcome: CheckOutcome,
    pub recorded_at: DateTime<Utc>,
}

pub struct UpdateRepository {
    shards: Vec<Mutex<HashMap<String, RepositoryEntry>>>,
}

impl UpdateRepository {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(count: usize) -> Self {
        let shards = (0..count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    /// Record an outcome, replacing any previous entry for the same app.
    pub fn put(&self, outcome: CheckOutcome) {
        let id = outcome.app.id.clone();
        let entry = RepositoryEntry {
            outcome,
            recorded_at: Utc::now(),
        };
        self.shard(&id).insert(id, entry);
    }

    pub fn get(&self, id: &str) -> Option<RepositoryEntry> {
        self.shard(id).get(id).cloned()
    }

    /// Like [`get`](Self::get), ignoring entries older than `max_age`.
    pub fn get_fresh(&self, id: &str, max_age: Duration) -> Option<RepositoryEntry> {
        let cutoff = Utc::now() - max_age;
        self.get(id).filter(|entry| entry.recorded_at >= cutoff)
    }

    /// Drop the entry for `id`. Returns whether one existed.
    pub fn invalidate(&self, id: &str) -> bool {
        self.shard(id).remove(id).is_some()
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            lock(shard).clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| lock(shard).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored outcome, in no particular order.
    pub fn outcomes(&self) -> Vec<CheckOutcome> {
        self.shards
            .iter()
            .flat_map(|shard| {
                lock(shard)
                    .values()
                    .map(|entry| entry.outcome.clone())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn shard(&self, id: &str) -> MutexGuard<'_, HashMap<String, RepositoryEntry>> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        lock(&self.shards[index])
    }
}

impl Default for UpdateRepository {
    fn default() -> Self {
        Self::new()
    }
}

// A panic while holding a shard cannot leave a half-written entry, so a
// poisoned lock is still safe to use.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
