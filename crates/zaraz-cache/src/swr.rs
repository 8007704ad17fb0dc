//! Stale-while-revalidate read-through cache.
//!
//! ## Read path
//!
//! - **Hit**: the cached value is returned at once and the producer is
//!   scheduled in the background; its result overwrites the entry.
//! - **Miss**: the producer is awaited inline, its result written back and
//!   returned.
//!
//! Either way the producer runs exactly once per call. Readers may observe
//! the previous value until the next read revalidates it; writers that need
//! their own effect to be visible call [`Swr::bust`].
//!
//! Every bust bumps a per-entry generation. A write computed under an older
//! generation is dropped, so a revalidation that raced a bust cannot restore
//! the value the bust removed.
//!
//! ## Failure handling
//!
//! Backend read errors and undecodable entries are treated as misses (the
//! latter are also deleted). Background failures and failed busts are logged
//! and swallowed: they can only leave stale data behind.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use crate::backend::CacheBackend;
use crate::tasks::BackgroundTasks;

/// Cache key identifying a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The full request URL, query included.
impl From<&Url> for CacheKey {
    fn from(url: &Url) -> Self {
        Self(url.as_str().to_string())
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-through cache over a [`CacheBackend`].
#[derive(Clone)]
pub struct Swr {
    backend: Arc<dyn CacheBackend>,
    tasks: BackgroundTasks,
    generations: Arc<Generations>,
}

/// Bust counters per `(namespace, key)`. Entries are created on first bust.
#[derive(Default)]
struct Generations(DashMap<(String, String), u64>);

impl Generations {
    fn current(&self, namespace: &str, key: &CacheKey) -> u64 {
        self.0
            .get(&(namespace.to_string(), key.as_str().to_string()))
            .map_or(0, |g| *g)
    }

    fn bump(&self, namespace: &str, key: &CacheKey) {
        *self
            .0
            .entry((namespace.to_string(), key.as_str().to_string()))
            .or_insert(0) += 1;
    }
}

impl Swr {
    pub fn new(backend: Arc<dyn CacheBackend>, tasks: BackgroundTasks) -> Self {
        Self {
            backend,
            tasks,
            generations: Arc::new(Generations::default()),
        }
    }

    /// The runner revalidations are spawned on.
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Returns the cached value for `key`, refreshing it in the background,
    /// or awaits `producer` when nothing usable is cached.
    ///
    /// # Errors
    ///
    /// Returns the producer's error on a miss. On a hit the producer's
    /// error is logged and the cached value is still returned.
    pub async fn swr<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        namespace: &str,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: fmt::Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if let Some(cached) = self.lookup::<T>(key, namespace).await {
            tracing::debug!(namespace, key = %key, "cache hit, revalidating");
            self.revalidate(key.clone(), namespace.to_string(), producer);
            return Ok(cached);
        }

        tracing::debug!(namespace, key = %key, "cache miss");
        let generation = self.generations.current(namespace, key);
        let fresh = producer().await?;
        if let Some(bytes) = encode(namespace, key, &fresh) {
            store(
                self.backend.as_ref(),
                &self.generations,
                namespace,
                key,
                generation,
                bytes,
            )
            .await;
        }
        Ok(fresh)
    }

    /// Removes `key` from `namespace`. Failures are logged, never returned.
    ///
    /// Writes already in flight for `key` are discarded.
    pub async fn bust(&self, key: &CacheKey, namespace: &str) {
        self.generations.bump(namespace, key);
        match self.backend.delete(namespace, key.as_str()).await {
            Ok(()) => tracing::debug!(namespace, key = %key, "cache bust"),
            Err(e) => {
                tracing::warn!(namespace, key = %key, error = %e, "cache bust failed");
            }
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey, namespace: &str) -> Option<T> {
        let data = match self.backend.get(namespace, key.as_str()).await {
            Ok(data) => data?,
            Err(e) => {
                tracing::warn!(namespace, key = %key, error = %e, "cache read failed");
                return None;
            }
        };

        match serde_json::from_slice::<T>(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(namespace, key = %key, error = %e, "failed to deserialize cached value");
                if let Err(e) = self.backend.delete(namespace, key.as_str()).await {
                    tracing::warn!(namespace, key = %key, error = %e, "failed to drop corrupt entry");
                }
                None
            }
        }
    }

    fn revalidate<T, E, F, Fut>(&self, key: CacheKey, namespace: String, producer: F)
    where
        T: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let generations = Arc::clone(&self.generations);
        let generation = generations.current(&namespace, &key);
        self.tasks.spawn("swr.revalidate", async move {
            let fresh = match producer().await {
                Ok(fresh) => fresh,
                Err(e) => {
                    tracing::warn!(namespace = %namespace, key = %key, error = %e, "revalidation failed");
                    return;
                }
            };
            let Some(bytes) = encode(&namespace, &key, &fresh) else {
                return;
            };
            if store(
                backend.as_ref(),
                &generations,
                &namespace,
                &key,
                generation,
                bytes,
            )
            .await
            {
                tracing::debug!(namespace = %namespace, key = %key, "cache revalidated");
            }
        });
    }
}

fn encode<T: Serialize>(namespace: &str, key: &CacheKey, value: &T) -> Option<Vec<u8>> {
    match serde_json::to_vec(value) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(namespace, key = %key, error = %e, "failed to serialize for cache");
            None
        }
    }
}

/// Writes `bytes` unless `key` was busted since `generation` was read.
/// Returns whether the entry was written.
async fn store(
    backend: &dyn CacheBackend,
    generations: &Generations,
    namespace: &str,
    key: &CacheKey,
    generation: u64,
    bytes: Vec<u8>,
) -> bool {
    if generations.current(namespace, key) != generation {
        tracing::debug!(namespace, key = %key, "entry busted during refresh, write dropped");
        return false;
    }
    match backend.put(namespace, key.as_str(), bytes).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(namespace, key = %key, error = %e, "cache write failed");
            false
        }
    }
}
