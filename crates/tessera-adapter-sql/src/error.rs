use std::time::Duration;
use tessera_core::{DbKind, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid pagination: page {page}, page size {page_size} (both must be at least 1)")]
    InvalidPagination { page: u64, page_size: u64 },

    /// Failure reported by the database driver, with its own message.
    #[error("{0}")]
    Driver(String),

    #[error("query did not finish within {0:?}")]
    Timeout(Duration),
}

impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self::Driver(db.message().to_string()),
            other => Self::Driver(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("live introspection is not supported for {0} data sources")]
    Unsupported(DbKind),
}
