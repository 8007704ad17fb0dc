//! Storage interfaces consumed by the authenticator.
//!
//! The authenticator does not own user persistence. It resolves a provider
//! identity to an application user through [`UserStore`], once per login.
//! [`MemoryUserStore`] backs tests and single-process deployments.

pub mod memory;
pub mod user;

pub use memory::MemoryUserStore;
pub use user::{User, UserStore};
