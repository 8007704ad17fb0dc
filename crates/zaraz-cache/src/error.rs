//! Cache error types.

use thiserror::Error;

/// Errors produced by cache backends and the SWR wrapper.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not complete the operation.
    #[error("Cache backend error: {message}")]
    Backend {
        /// Backend-specific description.
        message: String,
    },

    /// A value could not be serialized for storage.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Creates a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
