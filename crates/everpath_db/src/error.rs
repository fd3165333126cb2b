//! Error types for the database client

use everpath_common::EverpathError;
use thiserror::Error;

/// Errors that can occur when working with the database client
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SQLx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Error with database URL parsing
    #[error("Database URL error: {0}")]
    UrlError(String),

    /// Error with database pool creation
    #[error("Database pool error: {0}")]
    PoolError(String),

    /// Error with database query
    #[error("Database query error: {0}")]
    QueryError(String),

    /// Error with database transaction
    #[error("Database transaction error: {0}")]
    TransactionError(String),

    /// A stored value could not be mapped back into a domain type
    #[error("Corrupt row: {0}")]
    DecodeError(String),

    /// The booking slot is held by another appointment
    #[error("Slot already taken: {0}")]
    SlotTaken(String),

    /// The row to update does not exist
    #[error("Row not found: {0}")]
    NotFound(String),
}

impl DbError {
    /// Maps a failed write, turning unique-index violations into [`DbError::SlotTaken`].
    pub fn from_write(err: sqlx::Error, context: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::SlotTaken(context.to_string())
            }
            _ => DbError::QueryError(format!("{context}: {err}")),
        }
    }
}

impl From<DbError> for EverpathError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::SlotTaken(msg) => EverpathError::SlotConflictError(msg),
            DbError::NotFound(msg) => EverpathError::NotFoundError(msg),
            DbError::ConfigError(msg) | DbError::UrlError(msg) => EverpathError::ConfigError(msg),
            other => EverpathError::DatabaseError(other.to_string()),
        }
    }
}
