//! Per-user task lists.
//!
//! Handlers only see [`TodoStore`]; the in-memory implementation backs tests
//! and single-process deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Todo storage error: {0}")]
    Storage(String),
}

pub type TodoResult<T> = Result<T, TodoError>;

/// Storage for task lists, keyed by user id.
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Tasks of `user_id`, oldest first.
    async fn list(&self, user_id: &str) -> TodoResult<Vec<Todo>>;

    /// Appends a task and returns it.
    async fn add(&self, user_id: &str, title: &str) -> TodoResult<Todo>;

    /// Removes a task. Returns `false` if the user has no such task.
    async fn remove(&self, user_id: &str, todo_id: &str) -> TodoResult<bool>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTodoStore {
    lists: Arc<RwLock<HashMap<String, Vec<Todo>>>>,
}

impl MemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoStore for MemoryTodoStore {
    async fn list(&self, user_id: &str) -> TodoResult<Vec<Todo>> {
        Ok(self
            .lists
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add(&self, user_id: &str, title: &str) -> TodoResult<Todo> {
        let todo = Todo {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.lists
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(todo.clone());
        Ok(todo)
    }

    async fn remove(&self, user_id: &str, todo_id: &str) -> TodoResult<bool> {
        let mut lists = self.lists.write().await;
        let Some(list) = lists.get_mut(user_id) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|t| t.id != todo_id);
        Ok(list.len() != before)
    }
}
