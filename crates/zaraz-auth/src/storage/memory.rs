//! In-memory user store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::user::{User, UserStore};
use crate::AuthResult;
use crate::error::AuthError;

/// User store holding users in process memory, keyed by
/// `(provider, oauth_subject)`.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<(String, String), User>>>,
}

impl MemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns `true` if no users are stored.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_provider_subject(
        &self,
        provider: &str,
        subject: &str,
    ) -> AuthResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .get(&(provider.to_string(), subject.to_string()))
            .cloned())
    }

    async fn insert(&self, user: User) -> AuthResult<User> {
        let mut users = self.users.write().await;
        let key = (user.provider.clone(), user.oauth_subject.clone());
        if users.contains_key(&key) {
            return Err(AuthError::storage(format!(
                "user for {} subject already exists",
                user.provider
            )));
        }
        users.insert(key, user.clone());
        Ok(user)
    }
}
