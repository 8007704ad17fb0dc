use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use zaraz_auth::{Authenticator, MemoryStateStore, MemoryUserStore, UserStore};
use zaraz_cache::{BackgroundTasks, CacheBackend, LocalCacheBackend, Swr};

use crate::config::AppConfig;
use crate::routes;
use crate::todos::{MemoryTodoStore, TodoStore};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub cache: Swr,
    pub todos: Arc<dyn TodoStore>,
}

impl FromRef<AppState> for Arc<Authenticator> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    /// Wires the authenticator and loader cache from configuration.
    pub fn from_config(
        cfg: &AppConfig,
        user_store: Arc<dyn UserStore>,
        todos: Arc<dyn TodoStore>,
    ) -> anyhow::Result<Self> {
        let state_store = Arc::new(MemoryStateStore::new(
            cfg.auth.state_ttl,
            cfg.auth.state_capacity,
        ));
        let auth = Arc::new(Authenticator::new(cfg.auth.clone(), state_store, user_store)?);

        let backend: Arc<dyn CacheBackend> = match cfg.cache.entry_ttl {
            Some(ttl) => Arc::new(LocalCacheBackend::with_ttl(ttl)),
            None => Arc::new(LocalCacheBackend::new()),
        };
        let cache = Swr::new(backend, BackgroundTasks::new());

        Ok(Self { auth, cache, todos })
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        // Task list loader and actions
        .route("/z/{user_id}/home", get(routes::todos::home_loader))
        .route("/z/{user_id}/actions/add", post(routes::todos::add_action))
        .route(
            "/z/{user_id}/actions/remove",
            post(routes::todos::remove_action),
        )
        // Sign-in, provider callback, logout
        .merge(zaraz_auth::http::routes(state.auth.config()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ZarazServer {
    addr: SocketAddr,
    app: Router,
    tasks: BackgroundTasks,
    drain_timeout: Duration,
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Builds a server over in-memory user and task stores.
    pub fn build(self) -> anyhow::Result<ZarazServer> {
        let state = AppState::from_config(
            &self.config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryTodoStore::new()),
        )?;
        let tasks = state.cache.tasks().clone();

        Ok(ZarazServer {
            addr: self.config.addr(),
            app: build_app(state),
            tasks,
            drain_timeout: self.config.cache.drain_timeout,
        })
    }
}

impl ZarazServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        // Revalidations scheduled by the last responses still need to land.
        tracing::info!(pending = self.tasks.len(), "draining background tasks");
        self.tasks.drain(self.drain_timeout).await;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
