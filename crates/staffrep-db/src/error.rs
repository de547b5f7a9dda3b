//! Database-specific error types and conversions.

use staffrep_core::error::StaffError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Query rejected: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Corrupt record: {0}")]
    Serialization(String),

    #[error("Invalid database configuration: {0}")]
    Config(String),

    #[error("SQLite connection lock poisoned")]
    LockPoisoned,

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<DbError> for StaffError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => StaffError::NotFound { entity, id },
            DbError::Serialization(msg) => StaffError::Serialization(msg),
            DbError::Config(msg) => StaffError::Config(msg),
            DbError::Query(_) | DbError::Migration(_) => StaffError::Internal(err.to_string()),
            other @ (DbError::Surreal(_) | DbError::Sqlite(_) | DbError::LockPoisoned) => {
                StaffError::StoreUnavailable(other.to_string())
            }
        }
    }
}
