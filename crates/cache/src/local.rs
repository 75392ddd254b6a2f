//! In-process expiring counters backed by DashMap.
//! Used when no Redis URL is configured.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

/// Lock-free local counters with per-key expiry.
pub struct LocalCounter {
    store: Arc<DashMap<String, CounterEntry>>,
    prune_threshold: usize,
}

impl Default for LocalCounter {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl LocalCounter {
    /// Expired entries are swept whenever the map grows past `prune_threshold`.
    pub fn new(prune_threshold: usize) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            prune_threshold,
        }
    }

    /// Increment `key`, starting a fresh counter that lives for `ttl` when
    /// the key is missing or expired. Returns the new count.
    pub fn incr(&self, key: &str, ttl: Duration) -> u64 {
        if self.store.len() >= self.prune_threshold && !self.store.contains_key(key) {
            self.evict_expired();
        }

        let now = Instant::now();
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| CounterEntry {
                count: 0,
                expires_at: now + ttl,
            });
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + ttl;
        }
        entry.count += 1;
        entry.count
    }

    /// Current count, or 0 when missing or expired.
    pub fn get(&self, key: &str) -> u64 {
        self.store
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.count)
            .unwrap_or(0)
    }

    /// Remove expired entries. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        let now = Instant::now();
        self.store.retain(|_, entry| entry.expires_at > now);
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_within_window() {
        let counter = LocalCounter::default();
        let ttl = Duration::from_secs(120);
        assert_eq!(counter.incr("login:1.2.3.4:100", ttl), 1);
        assert_eq!(counter.incr("login:1.2.3.4:100", ttl), 2);
        assert_eq!(counter.incr("login:5.6.7.8:100", ttl), 1);
        assert_eq!(counter.get("login:1.2.3.4:100"), 2);
    }

    #[test]
    fn expired_entries_restart_and_are_pruned() {
        let counter = LocalCounter::new(2);
        counter.incr("a", Duration::ZERO);
        counter.incr("b", Duration::ZERO);
        assert_eq!(counter.get("a"), 0);
        assert_eq!(counter.incr("a", Duration::from_secs(60)), 1);

        // "c" is new and the map is at the threshold: "b" gets swept.
        counter.incr("c", Duration::from_secs(60));
        assert_eq!(counter.len(), 2);
        assert_eq!(counter.evict_expired(), 0);
    }
}
