//! User storage trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::provider::Identity;

/// An application user, created on first sign-in for a given
/// `(provider, oauth_subject)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Application user id. Carried in the session cookie.
    pub id: String,

    /// Email address reported by the provider.
    pub email: String,

    /// Provider-stable subject identifier.
    pub oauth_subject: String,

    /// Provider name (e.g. "google").
    pub provider: String,

    /// Display name.
    pub name: String,

    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Last update timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Builds a new user for a verified identity.
    ///
    /// The id is a fresh v4 UUID and the display name starts out as the id.
    #[must_use]
    pub fn from_identity(identity: &Identity, provider: impl Into<String>) -> Self {
        let id = Uuid::new_v4().to_string();
        let now = OffsetDateTime::now_utc();
        Self {
            name: id.clone(),
            id,
            email: identity.email.clone(),
            oauth_subject: identity.subject.clone(),
            provider: provider.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Storage for application users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds the user linked to a provider subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_provider_subject(
        &self,
        provider: &str,
        subject: &str,
    ) -> AuthResult<Option<User>>;

    /// Persists a new user.
    ///
    /// # Errors
    ///
    /// Returns an error if the user cannot be stored.
    async fn insert(&self, user: User) -> AuthResult<User>;
}
