//! # zaraz-cache
//!
//! Stale-while-revalidate caching for data loaders.
//!
//! - [`backend`] - namespaced async key-value stores
//! - [`swr`] - the read-through wrapper and invalidation
//! - [`tasks`] - tracked "run after response" background work

pub mod backend;
pub mod error;
pub mod swr;
pub mod tasks;

pub use backend::{CacheBackend, CachedEntry, LocalCacheBackend};
pub use error::{CacheError, CacheResult};
pub use swr::{CacheKey, Swr};
pub use tasks::BackgroundTasks;
