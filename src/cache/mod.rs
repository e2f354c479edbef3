//! Read-through cache seam.
//!
//! The lister stores JSON values under string keys derived from
//! `(operation, object, cursor)`. A hit within its TTL must be
//! indistinguishable from a fresh fetch, so values are stored exactly as
//! they would have been returned.

pub mod memory;
pub mod single_flight;

use std::time::{Duration, Instant};

use async_trait::async_trait;

pub use memory::MemoryCache;
pub use single_flight::SingleFlight;

/// One cached value with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Key the value is stored under.
    pub key: String,
    /// Cached value.
    pub value: T,
    /// Instant after which the entry is a miss.
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Build an entry that expires `ttl` from now.
    pub fn new(key: impl Into<String>, value: T, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Whether the entry is still within its TTL at `now`.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Key/value store with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live value.
    async fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Store a value for `ttl`.
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration);
}

/// Cache key for one listing page.
///
/// The folder is length-prefixed so ids and cursors containing `:` cannot
/// collide, and the first page (no cursor) never matches an empty cursor.
pub fn list_key(folder: &str, page_token: Option<&str>) -> String {
    match page_token {
        Some(token) => format!("list:{}:{}:{}", folder.len(), folder, token),
        None => format!("list:{}:{}", folder.len(), folder),
    }
}

/// Cache key for one object's metadata.
pub fn meta_key(id: &str) -> String {
    format!("meta:{}", id)
}
