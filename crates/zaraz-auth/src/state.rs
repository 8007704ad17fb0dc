//! Authorization state correlation.
//!
//! Before the browser is sent to the provider, a random state token is
//! minted and stored together with the URL the user originally asked for.
//! The provider echoes the token back on the callback, which both proves the
//! callback answers a request this instance issued (CSRF protection) and
//! recovers where to send the user afterwards.
//!
//! Tokens are single-use: [`StateStore::take`] removes the entry it returns.
//! Entries that are never consumed expire after the configured TTL.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use moka::future::Cache;
use url::Url;

use crate::AuthResult;

/// Random bytes per state token (256 bits).
const STATE_TOKEN_BYTES: usize = 32;

/// An unguessable token correlating an authorization request with its
/// callback.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StateToken(String);

impl StateToken {
    /// Generates a fresh token from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; STATE_TOKEN_BYTES];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Returns the token as sent in the `state` query parameter.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateToken(..)")
    }
}

/// A pending authorization: the token and where to return afterwards.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// Correlation token.
    pub token: StateToken,
    /// The URL the user requested before being sent to the provider.
    pub return_url: Url,
}

/// Storage for pending authorizations.
///
/// Implementations must bound the lifetime of every entry and must make
/// [`take`](Self::take) remove what it returns, so a token can be matched at
/// most once.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stores a pending authorization.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be stored.
    async fn put(&self, state: &AuthState) -> AuthResult<()>;

    /// Removes and returns the return URL stored for `token`.
    ///
    /// Returns `None` if the token was never issued, has expired, or has
    /// already been taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn take(&self, token: &str) -> AuthResult<Option<Url>>;
}

/// In-process state store with per-entry TTL.
#[derive(Clone)]
pub struct MemoryStateStore {
    cache: Cache<String, Url>,
}

impl MemoryStateStore {
    /// Creates a store whose entries live for `ttl` and which holds at most
    /// `capacity` outstanding tokens.
    ///
    /// Past `capacity` the cache evicts live entries, so a burst of
    /// unauthenticated requests can push out states minted for real users.
    /// Their callbacks then fail with `state_not_found` and restart the
    /// flow. Size `capacity` for the expected number of logins in flight
    /// within one `ttl`.
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(capacity)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn put(&self, state: &AuthState) -> AuthResult<()> {
        self.cache
            .insert(state.token.as_str().to_string(), state.return_url.clone())
            .await;
        tracing::debug!(return_url = %state.return_url, "Stored authorization state");
        Ok(())
    }

    async fn take(&self, token: &str) -> AuthResult<Option<Url>> {
        Ok(self.cache.remove(token).await)
    }
}
