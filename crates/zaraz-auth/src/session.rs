//! Signed session cookie.
//!
//! The session is a single cookie whose value is an HMAC-signed envelope of
//! `{id, email, exp}`. The signature is checked with a key derived from the
//! server-held secret; any cookie that fails verification, does not decode,
//! or has passed its sealed expiry reads as "no session".
//!
//! Cookie attributes: `Path=/; HttpOnly; Secure; SameSite=Lax`, with
//! `Expires` and `Max-Age` both set to the configured lifetime.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use cookie::{Cookie, CookieJar, Key, SameSite};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::config::{MIN_SECRET_LEN, SessionConfig};
use crate::error::AuthError;

/// The authenticated user as carried by the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Application user id.
    pub id: String,
    /// Email address.
    pub email: String,
}

/// Signed payload. `exp` is unix seconds.
#[derive(Serialize, Deserialize)]
struct SessionEnvelope {
    id: String,
    email: String,
    exp: i64,
}

/// Serializes and verifies session cookies.
#[derive(Clone)]
pub struct SessionCodec {
    key: Key,
    cookie_name: String,
    lifetime: Duration,
}

impl SessionCodec {
    /// Creates a codec from the session configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(config: &SessionConfig) -> Result<Self, AuthError> {
        if config.secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::configuration(format!(
                "session secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        let lifetime = Duration::try_from(config.lifetime).map_err(|e| {
            AuthError::configuration(format!("session lifetime out of range: {e}"))
        })?;

        Ok(Self {
            key: Key::derive_from(config.secret.as_bytes()),
            cookie_name: config.cookie_name.clone(),
            lifetime,
        })
    }

    /// Name of the session cookie.
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Produces the `Set-Cookie` header value for a new session.
    ///
    /// # Errors
    ///
    /// Returns an internal configuration error if the payload cannot be
    /// serialized.
    pub fn serialize(&self, user: &SessionUser) -> Result<String, AuthError> {
        self.serialize_at(user, OffsetDateTime::now_utc())
    }

    fn serialize_at(&self, user: &SessionUser, now: OffsetDateTime) -> Result<String, AuthError> {
        let expires = now + self.lifetime;
        let envelope = SessionEnvelope {
            id: user.id.clone(),
            email: user.email.clone(),
            exp: expires.unix_timestamp(),
        };
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| AuthError::configuration(format!("session payload: {e}")))?;

        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(Cookie::new(
            self.cookie_name.clone(),
            URL_SAFE_NO_PAD.encode(payload),
        ));
        let signed = jar
            .get(&self.cookie_name)
            .map(|c| c.value().to_string())
            .unwrap_or_default();

        let cookie = self
            .base_cookie(signed)
            .max_age(self.lifetime)
            .expires(expires)
            .build();
        Ok(cookie.encoded().to_string())
    }

    /// Reads the session from a `Cookie` request header.
    ///
    /// Returns `None` when the header is absent, the cookie is missing,
    /// the signature does not verify, the payload does not decode, or the
    /// sealed expiry has passed.
    #[must_use]
    pub fn deserialize(&self, cookie_header: Option<&str>) -> Option<SessionUser> {
        self.deserialize_at(cookie_header, OffsetDateTime::now_utc())
    }

    fn deserialize_at(
        &self,
        cookie_header: Option<&str>,
        now: OffsetDateTime,
    ) -> Option<SessionUser> {
        let raw = Cookie::split_parse_encoded(cookie_header?)
            .filter_map(Result::ok)
            .find(|c| c.name() == self.cookie_name)?
            .into_owned();

        let mut jar = CookieJar::new();
        jar.add_original(raw);
        let Some(verified) = jar.signed(&self.key).get(&self.cookie_name) else {
            tracing::debug!("Session cookie failed signature verification");
            return None;
        };

        let envelope = URL_SAFE_NO_PAD
            .decode(verified.value())
            .ok()
            .and_then(|bytes| serde_json::from_slice::<SessionEnvelope>(&bytes).ok());
        let Some(envelope) = envelope else {
            tracing::debug!("Session cookie payload did not decode");
            return None;
        };

        if envelope.exp <= now.unix_timestamp() {
            tracing::debug!(user_id = %envelope.id, "Session cookie expired");
            return None;
        }

        Some(SessionUser {
            id: envelope.id,
            email: envelope.email,
        })
    }

    /// Produces the `Set-Cookie` header value that removes the session.
    #[must_use]
    pub fn clear(&self) -> String {
        self.base_cookie(String::new())
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build()
            .to_string()
    }

    fn base_cookie(&self, value: String) -> cookie::CookieBuilder<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Lax)
    }
}
