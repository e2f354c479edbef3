//! In-process cache backend.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{CacheEntry, CacheStore};

/// Upper bound on stored entries before expired ones are swept.
const SWEEP_THRESHOLD: usize = 10_000;

/// `HashMap` behind a lock; expired entries are dropped lazily.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry<serde_json::Value>>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        {
            let entries = self.entries.read().ok()?;
            match entries.get(key) {
                Some(entry) if entry.is_fresh_at(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: remove unless a writer refreshed it meanwhile.
        let mut entries = self.entries.write().ok()?;
        if entries.get(key).is_some_and(|e| !e.is_fresh_at(now)) {
            entries.remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        // A poisoned map is left alone; every lookup is then a miss.
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if entries.len() >= SWEEP_THRESHOLD {
            let now = Instant::now();
            entries.retain(|_, e| e.is_fresh_at(now));
        }
        entries.insert(key.to_string(), CacheEntry::new(key, value, ttl));
    }
}
