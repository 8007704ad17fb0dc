use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::Value;
use tower::ServiceExt;
use zaraz_auth::{MemoryUserStore, SessionUser};
use zaraz_server::config::AppConfig;
use zaraz_server::todos::{MemoryTodoStore, TodoStore};
use zaraz_server::{AppState, build_app};

struct TestApp {
    app: Router,
    state: AppState,
    todos: Arc<MemoryTodoStore>,
}

fn test_app() -> TestApp {
    let mut cfg = AppConfig::default();
    cfg.auth.public_url = "https://zaraz.example.com".into();
    cfg.auth.provider.client_id = "client-id".into();
    cfg.auth.provider.client_secret = "client-secret".into();
    cfg.auth.session.secret = "0123456789abcdef0123456789abcdef".into();

    let todos = Arc::new(MemoryTodoStore::new());
    let state =
        AppState::from_config(&cfg, Arc::new(MemoryUserStore::new()), todos.clone()).unwrap();
    TestApp {
        app: build_app(state.clone()),
        state,
        todos,
    }
}

fn session_cookie(app: &TestApp, user_id: &str) -> String {
    let set_cookie = app
        .state
        .auth
        .codec()
        .serialize(&SessionUser {
            id: user_id.into(),
            email: format!("{user_id}@example.com"),
        })
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn get(app: &TestApp, uri: &str, cookie: Option<&str>) -> Response {
    let mut req = Request::get(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    app.app
        .clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_form(app: &TestApp, uri: &str, cookie: &str, body: &str) -> Response {
    let req = Request::post(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.app.clone().oneshot(req).await.unwrap()
}

async fn json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn titles(app: &TestApp, cookie: &str) -> Vec<String> {
    let response = get(app, "/z/u1/home", Some(cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    json(response).await["todos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn healthz_ok() {
    let app = test_app();
    let response = get(&app, "/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn home_requires_session() {
    let app = test_app();
    let response = get(&app, "/z/u1/home", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("state="));
}

#[tokio::test]
async fn home_of_another_user_is_forbidden() {
    let app = test_app();
    let cookie = session_cookie(&app, "u2");
    let response = get(&app, "/z/u1/home", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_form(&app, "/z/u1/actions/add", &cookie, "title=milk").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.todos.list("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn home_lists_user_and_todos() {
    let app = test_app();
    let cookie = session_cookie(&app, "u1");
    let body = json(get(&app, "/z/u1/home", Some(&cookie)).await).await;
    assert_eq!(body["user"]["id"], "u1");
    assert_eq!(body["user"]["email"], "u1@example.com");
    assert_eq!(body["todos"], Value::Array(vec![]));
}

#[tokio::test]
async fn add_busts_cached_home() {
    let app = test_app();
    let cookie = session_cookie(&app, "u1");

    // Populate the cache with the empty list.
    assert!(titles(&app, &cookie).await.is_empty());
    app.state.cache.tasks().wait_idle().await;

    let response = post_form(&app, "/z/u1/actions/add", &cookie, "title=milk").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json(response).await["title"], "milk");

    assert_eq!(titles(&app, &cookie).await, ["milk"]);
}

#[tokio::test]
async fn add_right_after_first_load_is_visible() {
    let app = test_app();
    let cookie = session_cookie(&app, "u1");

    // No wait between the uncached load and the write.
    assert!(titles(&app, &cookie).await.is_empty());
    let response = post_form(&app, "/z/u1/actions/add", &cookie, "title=milk").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    app.state.cache.tasks().wait_idle().await;

    assert_eq!(titles(&app, &cookie).await, ["milk"]);
}

#[tokio::test]
async fn writes_without_bust_are_served_stale_once() {
    let app = test_app();
    let cookie = session_cookie(&app, "u1");

    assert!(titles(&app, &cookie).await.is_empty());
    app.state.cache.tasks().wait_idle().await;

    app.todos.add("u1", "eggs").await.unwrap();

    // Stale hit, revalidated in the background.
    assert!(titles(&app, &cookie).await.is_empty());
    app.state.cache.tasks().wait_idle().await;
    assert_eq!(titles(&app, &cookie).await, ["eggs"]);
}

#[tokio::test]
async fn add_validates_form() {
    let app = test_app();
    let cookie = session_cookie(&app, "u1");

    let response = post_form(&app, "/z/u1/actions/add", &cookie, "title=++").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(response).await;
    assert_eq!(body["errors"][0]["field"], "title");
    assert!(app.todos.list("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_busts_cached_home() {
    let app = test_app();
    let cookie = session_cookie(&app, "u1");
    let todo = app.todos.add("u1", "milk").await.unwrap();

    assert_eq!(titles(&app, &cookie).await, ["milk"]);
    app.state.cache.tasks().wait_idle().await;

    let response = post_form(
        &app,
        "/z/u1/actions/remove",
        &cookie,
        &format!("id={}", todo.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(titles(&app, &cookie).await.is_empty());

    let response = post_form(
        &app,
        "/z/u1/actions/remove",
        &cookie,
        &format!("id={}", todo.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_clears_session() {
    let app = test_app();
    let response = get(&app, "/logout", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/");
    assert_eq!(
        response.headers()["clear-site-data"],
        "\"cookies\", \"storage\""
    );
}
