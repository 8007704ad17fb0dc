//! Authentication error types.
//!
//! Every variant is terminal for the request that produced it. Nothing in
//! this crate retries: a consumed authorization code or a spent state token
//! cannot be replayed, so the only recovery is to send the user back through
//! the sign-in entry point.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// Errors that can occur while authenticating a request or completing the
/// provider callback.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider redirected back with an `error` parameter.
    #[error("Provider denied authorization: {code}")]
    ProviderDenied {
        /// The provider's error code (e.g. `access_denied`).
        code: String,
    },

    /// The callback carried neither `code` nor `error`.
    #[error("Callback is missing the authorization code")]
    MissingCode,

    /// The token endpoint rejected the exchange or could not be reached.
    #[error("Token exchange failed: {message}")]
    ExchangeFailed {
        /// Description of the failure.
        message: String,
    },

    /// The token response or the ID token inside it had an unexpected shape.
    #[error("Unrecognized token: {message}")]
    UnrecognizedToken {
        /// Description of what did not match.
        message: String,
    },

    /// The ID token has no usable `sub` claim.
    #[error("ID token is missing the subject claim")]
    MissingSub,

    /// The ID token has no string `email` claim.
    #[error("ID token is missing the email claim")]
    MissingEmail,

    /// The provider has not verified the user's email address.
    #[error("Email address is not verified")]
    EmailNotVerified,

    /// The callback `state` is unknown, expired, forged or already used.
    #[error("Authorization state not found")]
    StateNotFound,

    /// The user store did not produce a user for a fresh identity.
    #[error("User could not be created: {message}")]
    NoUserCreated {
        /// Description of the store failure.
        message: String,
    },

    /// A backing store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `ProviderDenied` error.
    #[must_use]
    pub fn provider_denied(code: impl Into<String>) -> Self {
        Self::ProviderDenied { code: code.into() }
    }

    /// Creates a new `ExchangeFailed` error.
    #[must_use]
    pub fn exchange_failed(message: impl Into<String>) -> Self {
        Self::ExchangeFailed {
            message: message.into(),
        }
    }

    /// Creates a new `UnrecognizedToken` error.
    #[must_use]
    pub fn unrecognized_token(message: impl Into<String>) -> Self {
        Self::UnrecognizedToken {
            message: message.into(),
        }
    }

    /// Creates a new `NoUserCreated` error.
    #[must_use]
    pub fn no_user_created(message: impl Into<String>) -> Self {
        Self::NoUserCreated {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Stable snake_case name of the failure, suitable for logs and for the
    /// page shown to the user.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProviderDenied { .. } => "provider_denied",
            Self::MissingCode => "missing_code",
            Self::ExchangeFailed { .. } => "exchange_failed",
            Self::UnrecognizedToken { .. } => "unrecognized_token",
            Self::MissingSub => "missing_sub",
            Self::MissingEmail => "missing_email",
            Self::EmailNotVerified => "email_not_verified",
            Self::StateNotFound => "state_not_found",
            Self::NoUserCreated { .. } => "no_user_created",
            Self::Storage { .. } => "storage",
            Self::Configuration { .. } => "configuration",
        }
    }

    /// Returns `true` if the request itself was malformed or the provider's
    /// claims were unacceptable (422 category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ProviderDenied { .. }
                | Self::MissingCode
                | Self::MissingSub
                | Self::MissingEmail
                | Self::EmailNotVerified
                | Self::StateNotFound
        )
    }

    /// Returns `true` if an upstream or store failure caused the error
    /// (500 category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns `true` if the user should simply be sent back to the sign-in
    /// entry point instead of being shown the failure.
    #[must_use]
    pub fn restarts_flow(&self) -> bool {
        matches!(self, Self::StateNotFound | Self::NoUserCreated { .. })
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = (self.status_code(), self.kind()).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}
