//! Identity provider integration.
//!
//! - [`exchange`] - server-to-server code-for-token exchange
//! - [`claims`] - ID token decoding and claim validation
//!
//! The authorization URL the browser is sent to is built here as well, from
//! the same callback URL the exchange later presents to the token endpoint.

pub mod claims;
pub mod exchange;

use serde::Deserialize;
use url::Url;

use crate::config::ProviderConfig;
use crate::error::AuthError;
use crate::state::StateToken;

pub use claims::{IdTokenClaims, decode_identity};
pub use exchange::{ProviderToken, TokenExchangeClient};

/// A verified provider identity, derived from ID token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Provider-stable subject identifier (`sub`).
    pub subject: String,
    /// Verified email address.
    pub email: String,
}

/// Query parameters the provider appends to the callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code, present on success.
    #[serde(default)]
    pub code: Option<String>,

    /// OAuth error code, present when the user or provider refused.
    #[serde(default)]
    pub error: Option<String>,

    /// The state token issued with the authorization request.
    #[serde(default)]
    pub state: Option<String>,
}

impl CallbackParams {
    /// Extracts the callback parameters from a full callback URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Builds the provider authorization URL for a freshly minted state token.
///
/// # Errors
///
/// Returns a configuration error if the authorization endpoint is not a
/// valid URL.
pub fn authorization_url(
    provider: &ProviderConfig,
    callback_url: &Url,
    state: &StateToken,
) -> Result<Url, AuthError> {
    let mut url = Url::parse(&provider.authorization_endpoint).map_err(|e| {
        AuthError::configuration(format!("invalid authorization endpoint: {e}"))
    })?;
    {
        let mut params = url.query_pairs_mut();
        params.append_pair("client_id", &provider.client_id);
        params.append_pair("redirect_uri", callback_url.as_str());
        params.append_pair("response_type", "code");
        params.append_pair("state", state.as_str());
        params.append_pair("scope", &provider.scopes.join(" "));

        for (key, value) in &provider.extra_auth_params {
            params.append_pair(key, value);
        }
    }
    Ok(url)
}
