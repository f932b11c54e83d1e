use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use super::UsageInfo;
use crate::clock::SharedClock;

struct Entry {
    data: Arc<UsageInfo>,
    stored_at: DateTime<Utc>,
}

/// Per-account usage cache with a fixed TTL.
///
/// Entries are never invalidated by writes elsewhere; staleness is bounded
/// only by the TTL. Concurrent misses for the same account may both fetch,
/// and the last insert wins.
pub struct UsageCache {
    entries: DashMap<i64, Entry>,
    ttl: Duration,
    clock: SharedClock,
}

impl UsageCache {
    /// Create an empty cache
    pub fn new(ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Fresh entry for an account, if any
    pub fn get(&self, account_id: i64) -> Option<Arc<UsageInfo>> {
        let now = self.clock.now();
        self.entries
            .get(&account_id)
            .filter(|e| now - e.stored_at < self.ttl)
            .map(|e| e.data.clone())
    }

    /// Store a value stamped with the current time
    pub fn insert(&self, account_id: i64, data: Arc<UsageInfo>) {
        let stored_at = self.clock.now();
        self.entries.insert(account_id, Entry { data, stored_at });
    }

    /// Drop expired entries; returns how many were removed
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| now - e.stored_at < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries, fresh or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
