//! Request authentication and the provider round-trip.
//!
//! # Flow
//!
//! ```text
//! authenticate(request)
//!     ├─► valid session cookie → SessionUser
//!     └─► absent/invalid → mint state, store {state → request URL}
//!         └─► Rejection::Login(302 → provider authorization URL)
//!
//! handle_callback(url)
//!     ├─► state unknown/expired/used → StateNotFound
//!     ├─► exchange code, validate ID token claims
//!     ├─► find-or-create user
//!     └─► 302 → stored return URL, Set-Cookie: user=<signed session>
//!
//! logout()
//!     └─► 302 → logout_redirect, session cookie expired, Clear-Site-Data
//! ```

use std::sync::Arc;

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use url::Url;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::provider::{CallbackParams, Identity, TokenExchangeClient, authorization_url};
use crate::session::{SessionCodec, SessionUser};
use crate::state::{AuthState, StateStore, StateToken};
use crate::storage::{User, UserStore};

/// Why a request could not be authenticated.
///
/// `Login` is a control-flow signal, not a failure: the caller must hand the
/// redirect to the client unchanged.
#[derive(Debug)]
pub enum Rejection {
    /// No valid session. Redirect the browser to the provider.
    Login(Url),
    /// Starting the login flow itself failed.
    Failed(AuthError),
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Self::Login(location) => redirect(StatusCode::FOUND, location.as_str()),
            Self::Failed(err) => err.into_response(),
        }
    }
}

/// Redirect issued after a successful callback, carrying the new session.
#[derive(Debug, Clone)]
pub struct SessionRedirect {
    /// Where the user originally wanted to go.
    pub location: Url,
    /// `Set-Cookie` header value for the session.
    pub set_cookie: String,
    /// The user the session was issued for.
    pub user: SessionUser,
}

impl IntoResponse for SessionRedirect {
    fn into_response(self) -> Response {
        let mut response = redirect(StatusCode::FOUND, self.location.as_str());
        if let Ok(value) = HeaderValue::from_str(&self.set_cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        response
    }
}

/// Redirect that ends the session.
#[derive(Debug, Clone)]
pub struct LogoutRedirect {
    /// Where to send the user.
    pub location: String,
    /// `Set-Cookie` header value that expires the session cookie.
    pub set_cookie: String,
}

impl IntoResponse for LogoutRedirect {
    fn into_response(self) -> Response {
        let mut response = redirect(StatusCode::FOUND, &self.location);
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.set_cookie) {
            headers.insert(header::SET_COOKIE, value);
        }
        headers.insert(
            "clear-site-data",
            HeaderValue::from_static("\"cookies\", \"storage\""),
        );
        response
    }
}

pub(crate) fn redirect(status: StatusCode, location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Orchestrates session checks and the OAuth authorization-code flow.
pub struct Authenticator {
    config: AuthConfig,
    public_url: Url,
    callback_url: Url,
    state_store: Arc<dyn StateStore>,
    user_store: Arc<dyn UserStore>,
    exchange: TokenExchangeClient,
    codec: SessionCodec,
}

impl Authenticator {
    /// Creates an authenticator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(
        config: AuthConfig,
        state_store: Arc<dyn StateStore>,
        user_store: Arc<dyn UserStore>,
    ) -> AuthResult<Self> {
        config.validate()?;
        let public_url = config.public_url()?;
        let callback_url = config.callback_url()?;
        let exchange = TokenExchangeClient::new(&config.provider, callback_url.clone())?;
        let codec = SessionCodec::new(&config.session)?;

        Ok(Self {
            config,
            public_url,
            callback_url,
            state_store,
            user_store,
            exchange,
            codec,
        })
    }

    /// The configuration this authenticator was built from.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The session codec.
    #[must_use]
    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// Resolves a request path-and-query against the public URL.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the result is not a valid URL.
    pub fn request_url(&self, path_and_query: &str) -> AuthResult<Url> {
        self.public_url
            .join(path_and_query)
            .map_err(|e| AuthError::configuration(format!("invalid request path: {e}")))
    }

    /// Returns the session user, or a redirect into the login flow.
    ///
    /// The state token minted for the redirect maps back to `request_url`.
    ///
    /// # Errors
    ///
    /// [`Rejection::Login`] when there is no valid session;
    /// [`Rejection::Failed`] if the state could not be stored.
    pub async fn authenticate(
        &self,
        request_url: &Url,
        cookie_header: Option<&str>,
    ) -> Result<SessionUser, Rejection> {
        if let Some(user) = self.codec.deserialize(cookie_header) {
            return Ok(user);
        }

        let token = StateToken::generate();
        let location = authorization_url(&self.config.provider, &self.callback_url, &token)
            .map_err(Rejection::Failed)?;

        self.state_store
            .put(&AuthState {
                token,
                return_url: request_url.clone(),
            })
            .await
            .map_err(Rejection::Failed)?;

        tracing::info!(return_url = %request_url, "Redirecting to identity provider");
        Err(Rejection::Login(location))
    }

    /// Completes the provider round-trip.
    ///
    /// The state token is consumed before the code is exchanged, so a
    /// callback URL cannot be replayed even if the exchange fails.
    ///
    /// # Errors
    ///
    /// [`AuthError::StateNotFound`] if the state is missing, unknown, expired
    /// or already used; any exchange or claim error; store errors.
    pub async fn handle_callback(&self, callback_url: &Url) -> AuthResult<SessionRedirect> {
        let params = CallbackParams::from_url(callback_url);

        let state = params.state.as_deref().ok_or(AuthError::StateNotFound)?;
        let return_url = self
            .state_store
            .take(state)
            .await?
            .ok_or(AuthError::StateNotFound)?;

        let identity = self.exchange.identify(&params).await?;
        let user = self.find_or_create_user(&identity).await?;

        let session = SessionUser {
            id: user.id,
            email: user.email,
        };
        let set_cookie = self.codec.serialize(&session)?;

        tracing::info!(user_id = %session.id, return_url = %return_url, "Session issued");
        Ok(SessionRedirect {
            location: return_url,
            set_cookie,
            user: session,
        })
    }

    /// Ends the session.
    #[must_use]
    pub fn logout(&self) -> LogoutRedirect {
        LogoutRedirect {
            location: self.config.logout_redirect.clone(),
            set_cookie: self.codec.clear(),
        }
    }

    async fn find_or_create_user(&self, identity: &Identity) -> AuthResult<User> {
        let provider = &self.config.provider.name;
        if let Some(user) = self
            .user_store
            .find_by_provider_subject(provider, &identity.subject)
            .await?
        {
            return Ok(user);
        }

        // A concurrent first login may have inserted the same subject; the
        // re-read below picks up whichever row won.
        let inserted = self
            .user_store
            .insert(User::from_identity(identity, provider.clone()))
            .await;

        let found = self
            .user_store
            .find_by_provider_subject(provider, &identity.subject)
            .await;

        match (inserted, found) {
            (Ok(_), Ok(Some(user))) => {
                tracing::info!(user_id = %user.id, provider = %provider, "Created user");
                Ok(user)
            }
            (Err(e), Ok(Some(user))) => {
                tracing::debug!(user_id = %user.id, error = %e, "Insert lost to a concurrent login");
                Ok(user)
            }
            (Err(e), _) => Err(AuthError::no_user_created(e.to_string())),
            (Ok(_), Ok(None)) => Err(AuthError::no_user_created("user not found after insert")),
            (Ok(_), Err(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use crate::storage::MemoryUserStore;
    use std::collections::HashMap;
    use std::time::Duration;

    fn config() -> AuthConfig {
        let mut config = AuthConfig {
            public_url: "https://zaraz.example.com".to_string(),
            ..AuthConfig::default()
        };
        config.provider.client_id = "client-id".to_string();
        config.provider.client_secret = "client-secret".to_string();
        config.session.secret = "0123456789abcdef0123456789abcdef".to_string();
        config
    }

    fn authenticator(state_store: Arc<MemoryStateStore>) -> Authenticator {
        Authenticator::new(config(), state_store, Arc::new(MemoryUserStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_valid_session_is_returned() {
        let auth = authenticator(Arc::new(MemoryStateStore::new(Duration::from_secs(60), 10)));
        let user = SessionUser {
            id: "id-1".to_string(),
            email: "a@b.com".to_string(),
        };
        let set_cookie = auth.codec().serialize(&user).unwrap();
        let header = set_cookie.split(';').next().unwrap();

        let url = auth.request_url("/z/id-1/home").unwrap();
        let result = auth.authenticate(&url, Some(header)).await.unwrap();
        assert_eq!(result, user);
    }

    #[tokio::test]
    async fn test_missing_session_redirects_and_stores_state() {
        let store = Arc::new(MemoryStateStore::new(Duration::from_secs(60), 10));
        let auth = authenticator(store.clone());
        let url = auth.request_url("/z/id-1/home?tab=soon").unwrap();

        let Err(Rejection::Login(location)) = auth.authenticate(&url, None).await else {
            panic!("expected login redirect");
        };

        let query: HashMap<_, _> = location.query_pairs().into_owned().collect();
        assert_eq!(query["redirect_uri"], "https://zaraz.example.com/callback");
        assert_eq!(query["response_type"], "code");

        let stored = store.take(&query["state"]).await.unwrap();
        assert_eq!(stored, Some(url));
    }

    #[tokio::test]
    async fn test_each_redirect_mints_new_state() {
        let auth = authenticator(Arc::new(MemoryStateStore::new(Duration::from_secs(60), 10)));
        let url = auth.request_url("/").unwrap();

        let state_of = |rejection: Result<SessionUser, Rejection>| match rejection {
            Err(Rejection::Login(location)) => location
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned()),
            _ => None,
        };
        let first = state_of(auth.authenticate(&url, None).await);
        let second = state_of(auth.authenticate(&url, None).await);
        assert!(first.is_some());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_callback_without_state() {
        let auth = authenticator(Arc::new(MemoryStateStore::new(Duration::from_secs(60), 10)));
        let url = auth.request_url("/callback?code=abc").unwrap();
        let err = auth.handle_callback(&url).await.unwrap_err();
        assert!(matches!(err, AuthError::StateNotFound));
    }

    #[tokio::test]
    async fn test_callback_with_foreign_state() {
        let auth = authenticator(Arc::new(MemoryStateStore::new(Duration::from_secs(60), 10)));
        let url = auth
            .request_url("/callback?code=abc&state=never-issued")
            .unwrap();
        let err = auth.handle_callback(&url).await.unwrap_err();
        assert!(matches!(err, AuthError::StateNotFound));
    }

    #[tokio::test]
    async fn test_logout() {
        let auth = authenticator(Arc::new(MemoryStateStore::new(Duration::from_secs(60), 10)));
        let response = auth.logout().into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert_eq!(
            response.headers()["clear-site-data"],
            "\"cookies\", \"storage\""
        );
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("user=;"));
        assert!(set_cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Authenticator::new(
            AuthConfig::default(),
            Arc::new(MemoryStateStore::new(Duration::from_secs(60), 10)),
            Arc::new(MemoryUserStore::new()),
        );
        assert!(matches!(result, Err(AuthError::Configuration { .. })));
    }
}
