//! Authorization code exchange.

use std::fmt;

use serde::Deserialize;
use url::Url;

use super::{CallbackParams, Identity, claims::decode_identity};
use crate::config::ProviderConfig;
use crate::error::AuthError;

/// Token endpoint response.
///
/// Every field is required. The token is used only to derive the identity
/// and is dropped afterwards.
#[derive(Clone, Deserialize)]
pub struct ProviderToken {
    /// Access token for provider APIs.
    pub access_token: String,

    /// Token type. Must be `Bearer`.
    pub token_type: String,

    /// Granted scopes.
    pub scope: String,

    /// OIDC ID token (compact JWT).
    pub id_token: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

impl fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderToken")
            .field("access_token", &"[redacted]")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("id_token", &"[redacted]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl ProviderToken {
    /// Derives the verified identity from the ID token.
    ///
    /// # Errors
    ///
    /// See [`decode_identity`].
    pub fn identity(&self) -> Result<Identity, AuthError> {
        decode_identity(&self.id_token)
    }
}

/// Client for the provider's token endpoint.
#[derive(Clone)]
pub struct TokenExchangeClient {
    http_client: reqwest::Client,
    token_endpoint: Url,
    client_id: String,
    client_secret: String,
    callback_url: Url,
}

impl TokenExchangeClient {
    /// Creates a client for the configured provider.
    ///
    /// `callback_url` must be byte-identical to the `redirect_uri` sent in
    /// the authorization request.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token endpoint is invalid or the
    /// HTTP client cannot be built.
    pub fn new(provider: &ProviderConfig, callback_url: Url) -> Result<Self, AuthError> {
        let token_endpoint = Url::parse(&provider.token_endpoint)
            .map_err(|e| AuthError::configuration(format!("invalid token endpoint: {e}")))?;

        let http_client = reqwest::Client::builder()
            .timeout(provider.request_timeout)
            .build()
            .map_err(|e| AuthError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            token_endpoint,
            client_id: provider.client_id.clone(),
            client_secret: provider.client_secret.clone(),
            callback_url,
        })
    }

    /// Exchanges the callback's authorization code for tokens.
    ///
    /// A provider `error` takes precedence over a code. Failed exchanges are
    /// never retried: codes are single-use.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ProviderDenied`] if the callback carries `error`
    /// - [`AuthError::MissingCode`] if it carries no `code`
    /// - [`AuthError::ExchangeFailed`] on transport failure or non-success status
    /// - [`AuthError::UnrecognizedToken`] if the body does not match [`ProviderToken`]
    pub async fn exchange(&self, params: &CallbackParams) -> Result<ProviderToken, AuthError> {
        if let Some(error) = &params.error {
            return Err(AuthError::provider_denied(error.clone()));
        }

        let code = params.code.as_deref().ok_or(AuthError::MissingCode)?;

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.callback_url.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        tracing::debug!(
            token_endpoint = %self.token_endpoint,
            "Exchanging authorization code"
        );

        let response = self
            .http_client
            .post(self.token_endpoint.as_str())
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::exchange_failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::exchange_failed(format!("HTTP {status} - {body}")));
        }

        let token: ProviderToken = response
            .json()
            .await
            .map_err(|e| AuthError::unrecognized_token(format!("token response: {e}")))?;

        if token.token_type != "Bearer" {
            return Err(AuthError::unrecognized_token(format!(
                "unexpected token_type {:?}",
                token.token_type
            )));
        }

        Ok(token)
    }

    /// Exchanges the code and validates the resulting ID token.
    ///
    /// # Errors
    ///
    /// Any error from [`exchange`](Self::exchange) or
    /// [`ProviderToken::identity`].
    pub async fn identify(&self, params: &CallbackParams) -> Result<Identity, AuthError> {
        let token = self.exchange(params).await?;
        token.identity()
    }
}
