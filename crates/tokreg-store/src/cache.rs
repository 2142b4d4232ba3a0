//! # Read-Through Cache
//!
//! Key/value cache with per-entry TTL and explicit invalidation. Every
//! mutation in the engines writes through to the store first, then
//! refreshes or deletes the cache entry; reads are cache-first with store
//! fallback and warm-up on miss.
//!
//! The cache is never a correctness dependency: callers treat every error
//! from this interface as a miss, log it, and continue against the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use tokreg_core::CacheError;

use crate::document::Document;

/// TTL + explicit-invalidation cache over JSON documents.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a cached document. Expired entries count as misses.
    async fn get(&self, key: &str) -> Result<Option<Document>, CacheError>;

    /// Store a document with a time-to-live.
    async fn set(&self, key: &str, value: Document, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Cache read that degrades to a miss on backend failure.
///
/// Call sites treat `None` identically for "not cached" and "cache broken";
/// either way the store is consulted next.
pub async fn get_or_miss(cache: &dyn Cache, key: &str) -> Option<Document> {
    match cache.get(key).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(key, error = %e, "cache read failed; falling back to store");
            None
        }
    }
}

/// Cache write that logs and drops failures.
pub async fn set_or_log(cache: &dyn Cache, key: &str, value: Document, ttl: Duration) {
    if let Err(e) = cache.set(key, value, ttl).await {
        tracing::warn!(key, error = %e, "cache write failed; entry not cached");
    }
}

/// Cache invalidation that logs and drops failures.
pub async fn delete_or_log(cache: &dyn Cache, key: &str) {
    if let Err(e) = cache.delete(key).await {
        tracing::warn!(key, error = %e, "cache invalidation failed");
    }
}

/// In-memory [`Cache`] backend with lazy expiry.
///
/// Expired entries are dropped on access rather than by a sweeper; a third
/// reader after a TTL lapse simply takes the store path and re-warms.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, (Document, Instant)>>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (possibly expired, not yet collected) entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for MemoryCache {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Document>, CacheError> {
        let mut guard = self.entries.lock();
        match guard.get(key) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                guard.remove(key);
                Ok(None)
            }
            Some((doc, _)) => Ok(Some(doc.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Document, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .lock()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_within_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("identity:0xaa", json!({"status": "VERIFIED"}), Duration::from_secs(60))
            .await
            .unwrap();

        let hit = cache.get("identity:0xaa").await.unwrap().unwrap();
        assert_eq!(hit["status"], "VERIFIED");
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_collected() {
        let cache = MemoryCache::new();
        cache
            .set("k", json!(1), Duration::from_millis(0))
            .await
            .unwrap();

        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::from_secs(60)).await.unwrap();
        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_absent_key_is_ok() {
        let cache = MemoryCache::new();
        assert!(cache.delete("never-set").await.is_ok());
    }

    #[tokio::test]
    async fn set_overwrites_and_refreshes_ttl() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::from_millis(0)).await.unwrap();
        cache.set("k", json!(2), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().unwrap(), json!(2));
    }
}
