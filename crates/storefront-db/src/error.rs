//! # Storage Errors
//!
//! ```text
//! sqlx::Error / MigrateError ──► DbError ──► CartStore writer task
//!                                              ├── warn!
//!                                              └── PersistenceStatus.last_error
//! ```
//!
//! Nothing in this crate retries; the cart treats every failure as a
//! missed cache write and carries on from memory.

use thiserror::Error;

/// Why a storage operation failed.
#[derive(Debug, Error)]
pub enum DbError {
    /// The database file could not be opened, or the pool is closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An embedded migration failed or an applied one was edited.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected a statement (disk full, read-only file, busy).
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A non-SQLite backend refused the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Anything sqlx reports that has no better home above.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for storage operations.
pub type DbResult<T> = Result<T, DbError>;
