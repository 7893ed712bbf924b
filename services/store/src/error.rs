//! Error types for the record store
//!
//! Every backend reports failures through [`StoreError`]. Front ends are
//! expected to collapse these into a generic failure message.

use common::error::DatabaseError;
use thiserror::Error;

/// Custom error type for record store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// No row matched
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate username/email or other UNIQUE clash
    #[error("Uniqueness violation: {0}")]
    UniquenessViolation(String),

    /// Embedded database failure
    #[error("Database error: {0}")]
    Database(#[source] DatabaseError),

    /// Transport or decoding failure talking to the hosted backend
    #[error("Remote backend error: {0}")]
    Remote(#[from] reqwest::Error),

    /// The hosted backend answered with a non-success status
    #[error("Remote backend returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    /// Password hashing failed
    #[error("Password hashing error: {0}")]
    Hashing(String),

    /// Session file could not be read or written
    #[error("Session storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        if e.is_unique_violation() {
            StoreError::UniquenessViolation(e.to_string())
        } else {
            StoreError::Database(e)
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        DatabaseError::from(e).into()
    }
}

/// Type alias for record store results
pub type StoreResult<T> = Result<T, StoreError>;
