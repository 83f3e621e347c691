//! Key/value cache with per-entry expiry, used to hold the storage access token.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// A string cache whose entries expire.
///
/// Each call must be atomic on its own. Callers may race between a `get` miss and
/// the following `set`; the cache only has to keep the last value written.
pub trait TokenCache: Send + Sync {
    /// Returns the value for `key` unless it is missing or expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: String, ttl: Duration);

    fn remove(&self, key: &str);
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory [`TokenCache`]. Expired entries are dropped when read or swept.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed = removed, "Purged expired cache entries");
        }
        removed
    }

    /// Number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TokenCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key.to_string(), Entry { value, expires_at });
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_get_set() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("token"), None);

        cache.set("token", "abc".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("token"), Some("abc".to_string()));

        cache.set("token", "def".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("token"), Some("def".to_string()));
        assert_eq!(cache.len(), 1);

        cache.remove("token");
        assert_eq!(cache.get("token"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expiry() {
        let cache = MemoryCache::new();
        cache.set("short", "a".to_string(), Duration::from_millis(20));
        cache.set("long", "b".to_string(), Duration::from_secs(60));
        thread::sleep(Duration::from_millis(50));

        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some("b".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("a", "1".to_string(), Duration::ZERO);
        cache.set("b", "2".to_string(), Duration::ZERO);
        cache.set("c", "3".to_string(), Duration::from_secs(60));

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(MemoryCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        cache.set("token", format!("t{}", i), Duration::from_secs(60));
                        assert!(cache.get("token").is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 1);
    }
}
