//! Namespaced cache backends.
//!
//! Entries are addressed by `(namespace, key)`. Namespaces partition related
//! entries, e.g. one per logical resource, so unrelated keys never collide.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CacheResult;

/// Async key-value store used by the SWR wrapper.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the stored bytes, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn get(&self, namespace: &str, key: &str) -> CacheResult<Option<Arc<Vec<u8>>>>;

    /// Stores `value`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    async fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> CacheResult<()>;

    /// Removes the entry. Removing a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    async fn delete(&self, namespace: &str, key: &str) -> CacheResult<()>;
}

/// A cached payload.
///
/// The data is wrapped in `Arc` so hits hand out the payload without copying.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Option<Duration>,
}

impl CachedEntry {
    /// Create a new cached entry.
    pub fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired. Entries without a TTL never expire.
    pub fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| self.cached_at.elapsed() > ttl)
    }
}

/// Single-process backend on a `DashMap`.
#[derive(Clone, Default)]
pub struct LocalCacheBackend {
    entries: Arc<DashMap<(String, String), CachedEntry>>,
    ttl: Option<Duration>,
}

impl LocalCacheBackend {
    /// Creates a backend whose entries never expire on their own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend whose entries expire `ttl` after being written.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl: Some(ttl),
        }
    }

    /// Number of stored entries, expired ones included until next touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_key(namespace: &str, key: &str) -> (String, String) {
        (namespace.to_string(), key.to_string())
    }
}

#[async_trait]
impl CacheBackend for LocalCacheBackend {
    async fn get(&self, namespace: &str, key: &str) -> CacheResult<Option<Arc<Vec<u8>>>> {
        let entry_key = Self::entry_key(namespace, key);
        let Some(entry) = self.entries.get(&entry_key) else {
            return Ok(None);
        };
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(&entry_key);
            tracing::debug!(namespace, key, "cache entry expired");
            return Ok(None);
        }
        Ok(Some(Arc::clone(&entry.data)))
    }

    async fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> CacheResult<()> {
        self.entries.insert(
            Self::entry_key(namespace, key),
            CachedEntry::new(value, self.ttl),
        );
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> CacheResult<()> {
        self.entries.remove(&Self::entry_key(namespace, key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let backend = LocalCacheBackend::new();
        backend.put("todos", "k", b"v1".to_vec()).await.unwrap();
        assert_eq!(
            backend.get("todos", "k").await.unwrap().as_deref(),
            Some(&b"v1".to_vec())
        );

        backend.put("todos", "k", b"v2".to_vec()).await.unwrap();
        assert_eq!(
            backend.get("todos", "k").await.unwrap().as_deref(),
            Some(&b"v2".to_vec())
        );

        backend.delete("todos", "k").await.unwrap();
        assert!(backend.get("todos", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let backend = LocalCacheBackend::new();
        backend.put("a", "k", b"1".to_vec()).await.unwrap();
        assert!(backend.get("b", "k").await.unwrap().is_none());

        backend.delete("b", "k").await.unwrap();
        assert!(backend.get("a", "k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let backend = LocalCacheBackend::new();
        assert!(backend.delete("todos", "missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let backend = LocalCacheBackend::with_ttl(Duration::from_millis(20));
        backend.put("todos", "k", b"v".to_vec()).await.unwrap();
        assert!(backend.get("todos", "k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(backend.get("todos", "k").await.unwrap().is_none());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = CachedEntry::new(vec![1], None);
        assert!(!entry.is_expired());
    }
}
