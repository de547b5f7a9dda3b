//! Repository implementations of the user record store.

mod sqlite;
mod user;

pub use sqlite::SqliteUserRepository;
pub use user::SurrealUserRepository;
