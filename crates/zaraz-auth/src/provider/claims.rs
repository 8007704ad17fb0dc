//! ID token claim decoding.
//!
//! The ID token arrives in the token endpoint's response body over a direct
//! TLS connection to the provider, so its signature is not checked here. Only
//! the payload segment is decoded and the claims the application relies on
//! are validated.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use serde_json::Value;

use super::Identity;
use crate::error::AuthError;

/// The subset of OIDC claims the application reads.
///
/// `email` and `email_verified` are kept as raw JSON so that a claim of the
/// wrong type is reported as such instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdTokenClaims {
    /// Subject identifier.
    #[serde(default)]
    pub sub: Option<String>,

    /// Email address.
    #[serde(default)]
    pub email: Option<Value>,

    /// Whether the provider verified the email address.
    #[serde(default)]
    pub email_verified: Option<Value>,
}

impl IdTokenClaims {
    /// Validates the claims and produces the identity.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingSub`] if `sub` is absent or empty
    /// - [`AuthError::MissingEmail`] if `email` is absent, empty or not a string
    /// - [`AuthError::EmailNotVerified`] unless `email_verified` is exactly `true`
    pub fn into_identity(self) -> Result<Identity, AuthError> {
        let subject = self
            .sub
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingSub)?;

        let email = match self.email {
            Some(Value::String(email)) if !email.is_empty() => email,
            _ => return Err(AuthError::MissingEmail),
        };

        if self.email_verified != Some(Value::Bool(true)) {
            return Err(AuthError::EmailNotVerified);
        }

        Ok(Identity { subject, email })
    }
}

/// Decodes the payload of a compact JWS ID token and validates its claims.
///
/// # Errors
///
/// Returns [`AuthError::UnrecognizedToken`] if the token is not a
/// three-segment JWT with a base64url JSON payload, or one of the claim
/// errors from [`IdTokenClaims::into_identity`].
pub fn decode_identity(id_token: &str) -> Result<Identity, AuthError> {
    let mut segments = id_token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => {
            return Err(AuthError::unrecognized_token(
                "id_token is not a compact JWT",
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::unrecognized_token(format!("id_token payload: {e}")))?;

    let claims: IdTokenClaims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::unrecognized_token(format!("id_token claims: {e}")))?;

    claims.into_identity()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jwt(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signature = URL_SAFE_NO_PAD.encode("sig");
        format!("{header}.{payload}.{signature}")
    }

    #[test]
    fn test_valid_claims() {
        let token = jwt(&json!({
            "iss": "https://accounts.google.com",
            "sub": "u1",
            "email": "a@b.com",
            "email_verified": true
        }));
        let identity = decode_identity(&token).unwrap();
        assert_eq!(identity.subject, "u1");
        assert_eq!(identity.email, "a@b.com");
    }

    #[test]
    fn test_missing_sub() {
        let token = jwt(&json!({ "email": "a@b.com", "email_verified": true }));
        assert!(matches!(decode_identity(&token), Err(AuthError::MissingSub)));

        let token = jwt(&json!({ "sub": "", "email": "a@b.com", "email_verified": true }));
        assert!(matches!(decode_identity(&token), Err(AuthError::MissingSub)));
    }

    #[test]
    fn test_missing_or_non_string_email() {
        let token = jwt(&json!({ "sub": "u1", "email_verified": true }));
        assert!(matches!(decode_identity(&token), Err(AuthError::MissingEmail)));

        let token = jwt(&json!({ "sub": "u1", "email": 42, "email_verified": true }));
        assert!(matches!(decode_identity(&token), Err(AuthError::MissingEmail)));
    }

    #[test]
    fn test_email_not_verified() {
        let token = jwt(&json!({ "sub": "u1", "email": "a@b.com", "email_verified": false }));
        assert!(matches!(
            decode_identity(&token),
            Err(AuthError::EmailNotVerified)
        ));

        // Only a JSON `true` counts.
        let token = jwt(&json!({ "sub": "u1", "email": "a@b.com", "email_verified": "true" }));
        assert!(matches!(
            decode_identity(&token),
            Err(AuthError::EmailNotVerified)
        ));

        let token = jwt(&json!({ "sub": "u1", "email": "a@b.com" }));
        assert!(matches!(
            decode_identity(&token),
            Err(AuthError::EmailNotVerified)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["", "abc", "a.b", "a.b.c.d", "a.!!!.c"] {
            assert!(
                matches!(
                    decode_identity(token),
                    Err(AuthError::UnrecognizedToken { .. })
                ),
                "token {token:?} should be unrecognized"
            );
        }

        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(
            decode_identity(&not_json),
            Err(AuthError::UnrecognizedToken { .. })
        ));
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let payload = base64::engine::general_purpose::URL_SAFE
            .encode(json!({ "sub": "u1", "email": "a@b.com", "email_verified": true }).to_string());
        let token = format!("h.{payload}.s");
        assert!(decode_identity(&token).is_ok());
    }
}
