//! Authentication configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! public_url = "https://zaraz.example.com"
//! state_ttl = "10m"
//!
//! [auth.provider]
//! client_id = "1234.apps.googleusercontent.com"
//! client_secret = "..."
//!
//! [auth.session]
//! secret = "at least thirty-two bytes of secret material"
//! lifetime = "24h"
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AuthError;

/// Minimum length of the session signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Root authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Public base URL of the application. Request URLs, the return URL
    /// stored with each state token and the provider `redirect_uri` are all
    /// resolved against it.
    pub public_url: String,

    /// Path the provider redirects back to. Must be registered with the
    /// provider exactly as `public_url` + `callback_path`.
    pub callback_path: String,

    /// Sign-in entry point. Failed callbacks send the user here.
    pub sign_in_path: String,

    /// Where logout redirects to.
    pub logout_redirect: String,

    /// How long a state token stays valid. The whole provider round-trip has
    /// to complete within this window.
    #[serde(with = "humantime_serde")]
    pub state_ttl: Duration,

    /// Upper bound on outstanding state tokens held in memory.
    pub state_capacity: u64,

    /// Identity provider settings.
    pub provider: ProviderConfig,

    /// Session cookie settings.
    pub session: SessionConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8787".to_string(),
            callback_path: "/callback".to_string(),
            sign_in_path: "/auth".to_string(),
            logout_redirect: "/".to_string(),
            state_ttl: Duration::from_secs(600), // 10 minutes
            state_capacity: 10_000,
            provider: ProviderConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Parsed `public_url`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL does not parse or is not an
    /// absolute http(s) URL.
    pub fn public_url(&self) -> Result<Url, AuthError> {
        let url = Url::parse(&self.public_url).map_err(|e| {
            AuthError::configuration(format!("auth.public_url is invalid: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(AuthError::configuration(
                "auth.public_url must be an absolute http(s) URL",
            ));
        }
        Ok(url)
    }

    /// The exact `redirect_uri` sent in both the authorization request and
    /// the code exchange.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `public_url` is invalid.
    pub fn callback_url(&self) -> Result<Url, AuthError> {
        self.public_url()?
            .join(&self.callback_path)
            .map_err(|e| AuthError::configuration(format!("auth.callback_path is invalid: {e}")))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<(), AuthError> {
        self.public_url()?;
        for (name, path) in [
            ("auth.callback_path", &self.callback_path),
            ("auth.sign_in_path", &self.sign_in_path),
            ("auth.logout_redirect", &self.logout_redirect),
        ] {
            if !path.starts_with('/') {
                return Err(AuthError::configuration(format!(
                    "{name} must start with '/'"
                )));
            }
        }
        if self.state_ttl.is_zero() {
            return Err(AuthError::configuration("auth.state_ttl must be > 0"));
        }
        if self.state_capacity == 0 {
            return Err(AuthError::configuration("auth.state_capacity must be > 0"));
        }
        self.provider.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

/// Identity provider configuration.
///
/// Defaults point at Google's OAuth 2.0 endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Name recorded on users created through this provider.
    pub name: String,

    /// OAuth client identifier.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: String,

    /// Authorization endpoint the browser is redirected to.
    pub authorization_endpoint: String,

    /// Token endpoint used for the server-to-server code exchange.
    pub token_endpoint: String,

    /// Requested scopes, joined with spaces.
    pub scopes: Vec<String>,

    /// Extra query parameters appended to the authorization URL.
    pub extra_auth_params: BTreeMap<String, String>,

    /// Timeout for the code exchange request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "google".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
                "openid".to_string(),
            ],
            extra_auth_params: BTreeMap::from([(
                "access_type".to_string(),
                "online".to_string(),
            )]),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ProviderConfig {
    fn validate(&self) -> Result<(), AuthError> {
        if self.name.is_empty() {
            return Err(AuthError::configuration("auth.provider.name is required"));
        }
        if self.client_id.is_empty() {
            return Err(AuthError::configuration(
                "auth.provider.client_id is required",
            ));
        }
        if self.client_secret.is_empty() {
            return Err(AuthError::configuration(
                "auth.provider.client_secret is required",
            ));
        }
        for (name, endpoint) in [
            ("auth.provider.authorization_endpoint", &self.authorization_endpoint),
            ("auth.provider.token_endpoint", &self.token_endpoint),
        ] {
            Url::parse(endpoint)
                .map_err(|e| AuthError::configuration(format!("{name} is invalid: {e}")))?;
        }
        if self.scopes.is_empty() {
            return Err(AuthError::configuration(
                "auth.provider.scopes must not be empty",
            ));
        }
        Ok(())
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie name.
    pub cookie_name: String,

    /// Server-held signing secret. Must be at least [`MIN_SECRET_LEN`] bytes.
    pub secret: String,

    /// Session lifetime. Applied to the cookie's `Expires` and `Max-Age`
    /// attributes and to the expiry sealed inside the signed value.
    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "user".to_string(),
            secret: String::new(),
            lifetime: Duration::from_secs(24 * 3600), // 24 hours
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<(), AuthError> {
        if self.cookie_name.is_empty() {
            return Err(AuthError::configuration(
                "auth.session.cookie_name is required",
            ));
        }
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::configuration(format!(
                "auth.session.secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.lifetime.is_zero() {
            return Err(AuthError::configuration(
                "auth.session.lifetime must be > 0",
            ));
        }
        Ok(())
    }
}
