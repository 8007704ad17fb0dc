//! Axum glue for the sign-in flow.
//!
//! - [`SessionAuth`] - extractor that yields the session user or redirects
//!   the browser into the provider login
//! - [`sign_in_handler`] - `GET {sign_in_path}`, sends signed-in users home
//! - [`callback_handler`] - `GET {callback_path}`, completes the round-trip
//! - [`logout_handler`] - `GET|POST /logout`, clears the session
//!
//! # Usage
//!
//! ```ignore
//! let auth = Arc::new(Authenticator::new(config, state_store, user_store)?);
//! let app = Router::new()
//!     .merge(zaraz_auth::http::routes(auth.config()))
//!     .with_state(auth);
//! ```

use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, FromRequestParts, State},
    http::{StatusCode, Uri, header, request::Parts},
    response::{Html, IntoResponse, Response},
    routing::get,
};

use crate::authenticator::{Authenticator, Rejection, redirect};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::session::SessionUser;

/// Route that ends the session.
pub const LOGOUT_PATH: &str = "/logout";

/// Builds the sign-in, callback and logout routes.
pub fn routes<S>(config: &AuthConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Arc<Authenticator>: FromRef<S>,
{
    Router::new()
        .route(&config.sign_in_path, get(sign_in_handler))
        .route(&config.callback_path, get(callback_handler))
        .route(LOGOUT_PATH, get(logout_handler).post(logout_handler))
}

/// The authenticated session user.
///
/// Rejects with a redirect to the provider when the request carries no valid
/// session; the stored return URL is the request's own URL.
#[derive(Debug, Clone)]
pub struct SessionAuth(pub SessionUser);

impl<S> FromRequestParts<S> for SessionAuth
where
    S: Send + Sync,
    Arc<Authenticator>: FromRef<S>,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<Authenticator>::from_ref(state);

        let request_url = auth
            .request_url(path_and_query(&parts.uri))
            .map_err(Rejection::Failed)?;

        // HTTP/2 clients may split cookies across several headers.
        let cookies = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        let cookie_header = (!cookies.is_empty()).then_some(cookies.as_str());

        let user = auth.authenticate(&request_url, cookie_header).await?;
        tracing::debug!(
            user_id = %user.id,
            path = %parts.uri.path(),
            "Session authenticated"
        );
        Ok(Self(user))
    }
}

/// Path and query of a request URI, as resolved by
/// [`Authenticator::request_url`].
pub fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query().map_or("/", |pq| pq.as_str())
}

/// Home URL of a signed-in user.
#[must_use]
pub fn home_path(user_id: &str) -> String {
    format!("/z/{user_id}/home")
}

/// Sign-in entry point. Already signed-in users go straight home.
pub async fn sign_in_handler(SessionAuth(user): SessionAuth) -> Response {
    redirect(StatusCode::FOUND, &home_path(&user.id))
}

/// Provider callback.
pub async fn callback_handler(State(auth): State<Arc<Authenticator>>, uri: Uri) -> Response {
    let callback_url = match auth.request_url(path_and_query(&uri)) {
        Ok(url) => url,
        Err(err) => return err.into_response(),
    };

    match auth.handle_callback(&callback_url).await {
        Ok(issued) => issued.into_response(),
        Err(err) => callback_failure(&err, &auth.config().sign_in_path),
    }
}

fn callback_failure(err: &AuthError, sign_in_path: &str) -> Response {
    if err.is_server_error() {
        tracing::error!(kind = err.kind(), error = %err, "Sign-in callback failed");
    } else {
        tracing::warn!(kind = err.kind(), error = %err, "Sign-in callback rejected");
    }

    if err.restarts_flow() {
        return redirect(StatusCode::FOUND, sign_in_path);
    }

    let body = format!(
        "<!doctype html>\n<title>Sign-in failed</title>\n\
         <p>Sign-in failed: <code>{}</code></p>\n\
         <p><a href=\"{}\">Try again</a></p>\n",
        err.kind(),
        sign_in_path
    );
    (err.status_code(), Html(body)).into_response()
}

/// Ends the session.
pub async fn logout_handler(State(auth): State<Arc<Authenticator>>) -> Response {
    tracing::info!("Session cleared");
    auth.logout().into_response()
}

/// Plain 403 for a session that does not own the requested resource.
#[must_use]
pub fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "forbidden").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::state::MemoryStateStore;
    use crate::storage::MemoryUserStore;
    use std::time::Duration;

    fn app() -> (Router, Arc<Authenticator>) {
        let mut config = AuthConfig {
            public_url: "https://zaraz.example.com".to_string(),
            ..AuthConfig::default()
        };
        config.provider.client_id = "client-id".to_string();
        config.provider.client_secret = "client-secret".to_string();
        config.session.secret = "0123456789abcdef0123456789abcdef".to_string();

        let auth = Arc::new(
            Authenticator::new(
                config,
                Arc::new(MemoryStateStore::new(Duration::from_secs(60), 100)),
                Arc::new(MemoryUserStore::new()),
            )
            .unwrap(),
        );
        let router = routes(auth.config()).with_state(auth.clone());
        (router, auth)
    }

    #[tokio::test]
    async fn test_sign_in_without_session_redirects_to_provider() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/auth").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://accounts.google.com/"));
    }

    #[tokio::test]
    async fn test_sign_in_with_session_redirects_home() {
        let (app, auth) = app();
        let set_cookie = auth
            .codec()
            .serialize(&SessionUser {
                id: "u-42".to_string(),
                email: "a@b.com".to_string(),
            })
            .unwrap();
        let cookie = set_cookie.split(';').next().unwrap();

        let response = app
            .oneshot(
                Request::get("/auth")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/z/u-42/home");
    }

    #[tokio::test]
    async fn test_callback_with_unknown_state_restarts() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::get("/callback?code=abc&state=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/auth");
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[test]
    fn test_callback_failure_page() {
        let response = callback_failure(&AuthError::EmailNotVerified, "/auth");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let response = callback_failure(&AuthError::exchange_failed("HTTP 400"), "/auth");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_logout_route() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::post("/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(response.headers().contains_key("clear-site-data"));
    }
}
