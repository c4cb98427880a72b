//! Error types for filedock.

use thiserror::Error;

/// Common error type for filedock.
#[derive(Error, Debug)]
pub enum FiledockError {
    /// Database error.
    ///
    /// Wraps errors from any database backend. Errors from sqlx are
    /// converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The record exists but no content store holds its bytes.
    #[error("content unavailable for file {0}")]
    ContentUnavailable(String),

    /// Remote mirror (FTP) error.
    #[error("remote store error: {0}")]
    Remote(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for FiledockError {
    fn from(e: sqlx::Error) -> Self {
        FiledockError::Database(e.to_string())
    }
}

/// Result type alias for filedock operations.
pub type Result<T> = std::result::Result<T, FiledockError>;
