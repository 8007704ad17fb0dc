//! # zaraz-auth
//!
//! Sign-in for Zaraz through an external OAuth 2.0 / OpenID Connect provider.
//!
//! ## Modules
//!
//! - [`config`] - provider, session and flow configuration
//! - [`state`] - single-use CSRF state tokens and their return URLs
//! - [`provider`] - authorization URL, code exchange and ID token claims
//! - [`session`] - the signed `user` session cookie
//! - [`storage`] - the user store interface and an in-memory store
//! - [`authenticator`] - the request/callback/logout orchestration
//! - [`http`] - axum extractor and handlers
//! - [`error`] - the error taxonomy

pub mod authenticator;
pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod session;
pub mod state;
pub mod storage;

pub use authenticator::{Authenticator, LogoutRedirect, Rejection, SessionRedirect};
pub use config::{AuthConfig, ProviderConfig, SessionConfig};
pub use error::AuthError;
pub use http::SessionAuth;
pub use provider::{CallbackParams, Identity, ProviderToken, TokenExchangeClient};
pub use session::{SessionCodec, SessionUser};
pub use state::{AuthState, MemoryStateStore, StateStore, StateToken};
pub use storage::{MemoryUserStore, User, UserStore};

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
