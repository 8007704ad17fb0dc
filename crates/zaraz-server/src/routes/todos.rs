//! Task list loader and actions.
//!
//! The loader is served through the SWR cache, keyed by its full request URL
//! in the `todos` namespace. Actions write through [`TodoStore`] and then bust
//! the owner's home URL so the next load sees the change.

use std::collections::HashMap;

use axum::{
    Form, Json,
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use zaraz_auth::SessionUser;
use zaraz_auth::http::{SessionAuth, forbidden, home_path, path_and_query};
use zaraz_cache::CacheKey;

use crate::server::AppState;
use crate::todos::{Todo, TodoError};
use crate::validation::{FormSchema, NewTodo, RemoveTodo};

/// Cache namespace for task list pages.
pub const TODOS_NAMESPACE: &str = "todos";

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub user: SessionUser,
    pub todos: Vec<Todo>,
}

/// `GET /z/{user_id}/home`
pub async fn home_loader(
    SessionAuth(user): SessionAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    uri: Uri,
) -> Response {
    if user.id != user_id {
        tracing::warn!(user_id = %user.id, requested = %user_id, "Foreign task list requested");
        return forbidden();
    }

    let url = match state.auth.request_url(path_and_query(&uri)) {
        Ok(url) => url,
        Err(e) => return e.into_response(),
    };
    let key = CacheKey::from(&url);

    let store = state.todos.clone();
    let owner = user_id.clone();
    let loaded = state
        .cache
        .swr(&key, TODOS_NAMESPACE, move || async move {
            store.list(&owner).await
        })
        .await;

    match loaded {
        Ok(todos) => Json(HomePage { user, todos }).into_response(),
        Err(e) => storage_failure(&e),
    }
}

/// `POST /z/{user_id}/actions/add`
pub async fn add_action(
    SessionAuth(user): SessionAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Form(input): Form<HashMap<String, String>>,
) -> Response {
    if user.id != user_id {
        return forbidden();
    }

    let new = match NewTodo::validate(&input).into_result() {
        Ok(new) => new,
        Err(errors) => return errors.into_response(),
    };

    match state.todos.add(&user_id, &new.title).await {
        Ok(todo) => {
            bust_home(&state, &user_id).await;
            tracing::info!(user_id = %user_id, todo_id = %todo.id, "Task added");
            (StatusCode::CREATED, Json(todo)).into_response()
        }
        Err(e) => storage_failure(&e),
    }
}

/// `POST /z/{user_id}/actions/remove`
pub async fn remove_action(
    SessionAuth(user): SessionAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Form(input): Form<HashMap<String, String>>,
) -> Response {
    if user.id != user_id {
        return forbidden();
    }

    let remove = match RemoveTodo::validate(&input).into_result() {
        Ok(remove) => remove,
        Err(errors) => return errors.into_response(),
    };

    match state.todos.remove(&user_id, &remove.id).await {
        Ok(true) => {
            bust_home(&state, &user_id).await;
            tracing::info!(user_id = %user_id, todo_id = %remove.id, "Task removed");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => storage_failure(&e),
    }
}

async fn bust_home(state: &AppState, user_id: &str) {
    match state.auth.request_url(&home_path(user_id)) {
        Ok(url) => state.cache.bust(&CacheKey::from(&url), TODOS_NAMESPACE).await,
        Err(e) => tracing::warn!(user_id, error = %e, "Cannot resolve home URL to bust"),
    }
}

fn storage_failure(err: &TodoError) -> Response {
    tracing::error!(error = %err, "Task storage failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "task storage unavailable").into_response()
}
