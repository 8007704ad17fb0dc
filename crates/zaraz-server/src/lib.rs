pub mod config;
pub mod observability;
pub mod routes;
pub mod server;
pub mod todos;
pub mod validation;

pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, ServerBuilder, ZarazServer, build_app};
