//! Common error types for Lisan

use thiserror::Error;

/// Common result type for Lisan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Lisan crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uniqueness or ordering conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the wrapped database error is a UNIQUE constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(e) => e
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// True when the wrapped database error is a FOREIGN KEY violation
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            Error::Database(e) => e
                .as_database_error()
                .map(|db| db.is_foreign_key_violation())
                .unwrap_or(false),
            _ => false,
        }
    }
}
