//! Error types shared by every staffrep crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StaffError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Chat platform error: {0}")]
    Platform(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StaffError {
    pub fn validation(message: impl Into<String>) -> Self {
        StaffError::Validation {
            message: message.into(),
        }
    }
}

pub type StaffResult<T> = Result<T, StaffError>;
