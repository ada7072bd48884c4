//! Error types for the database client

use huddle_common::HuddleError;
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

    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A stored value could not be mapped back into a model
    #[error("Invalid stored value: {0}")]
    DecodeError(String),
}

impl DbError {
    /// Maps a query failure, keeping unique violations distinguishable.
    pub(crate) fn from_query(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::UniqueViolation(db_err.message().to_string())
            }
            _ => DbError::QueryError(err.to_string()),
        }
    }
}

impl From<DbError> for HuddleError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation(msg) => HuddleError::Conflict(msg),
            DbError::ConfigError(msg) | DbError::UrlError(msg) => HuddleError::Config(msg),
            other => HuddleError::Database(other.to_string()),
        }
    }
}
