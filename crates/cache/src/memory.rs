//! In-process cache backend
//!
//! A concurrent map with explicit expiry timestamps. Expiry is enforced on
//! every read, so the sweeper only reclaims memory; it is never needed for
//! correctness.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory cache with TTLs.
pub struct InMemoryCache {
    entries: DashMap<String, Entry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn set(&self, key: &str, value: String, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Delete keys matching `prefix*` (or an exact key when the pattern has
    /// no trailing star). Returns the number removed.
    pub fn scan_and_delete(&self, pattern: &str) -> usize {
        let before = self.entries.len();
        if let Some(prefix) = pattern.strip_suffix('*') {
            self.entries.retain(|key, _| !key.starts_with(prefix));
        } else {
            self.entries.retain(|key, _| key != pattern);
        }
        before.saturating_sub(self.entries.len())
    }

    /// Drop expired entries.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Periodic cleanup task. Holds only a weak reference so the task ends
    /// when the cache is dropped.
    pub fn spawn_sweeper(store: &Arc<Self>, interval: Duration) {
        let weak: Weak<Self> = Arc::downgrade(store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(store) = weak.upgrade() else {
                    break;
                };
                let removed = store.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "cache sweeper reclaimed entries");
                }
            }
        });
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let cache = InMemoryCache::new();
        cache.set("a", "1".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some("1".to_string()));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_expired_entry_never_returned() {
        let cache = InMemoryCache::new();
        cache.set("a", "1".to_string(), Duration::from_millis(0));
        // No sweeper involved; the read itself must refuse the stale value
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overwrite_refreshes_ttl() {
        let cache = InMemoryCache::new();
        cache.set("a", "1".to_string(), Duration::from_millis(0));
        cache.set("a", "2".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some("2".to_string()));
    }

    #[test]
    fn test_scan_and_delete_prefix() {
        let cache = InMemoryCache::new();
        cache.set("query:1", "a".to_string(), Duration::from_secs(60));
        cache.set("query:2", "b".to_string(), Duration::from_secs(60));
        cache.set("geo:1", "c".to_string(), Duration::from_secs(60));

        assert_eq!(cache.scan_and_delete("query:*"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.scan_and_delete("geo:1"), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache = InMemoryCache::new();
        cache.set("old", "1".to_string(), Duration::from_millis(0));
        cache.set("new", "2".to_string(), Duration::from_secs(60));
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.get("new"), Some("2".to_string()));
    }
}
