//! Staffrep Database — store backends for staff user records.
//!
//! This crate provides:
//! - SurrealDB connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - The document backend ([`repository::SurrealUserRepository`])
//! - The serialized-blob backend ([`repository::SqliteUserRepository`])
//! - Backend selection from configuration ([`UserStore`], [`open_store`])
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod repository;
mod schema;
mod store;

pub use connection::{Backend, DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
pub use store::{UserStore, open_store};
