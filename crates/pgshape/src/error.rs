//! Error types for pgshape
//!
//! ## Error classification
//!
//! `SqlError` variants fall into two categories:
//!
//! **Composition errors** — raised while a fragment is compiled to SQL:
//! [`SelfWithoutColumn`](SqlError::SelfWithoutColumn),
//! [`ParentWithoutTable`](SqlError::ParentWithoutTable).
//!
//! **Execution errors** — raised while a compiled query runs or its rows are
//! reshaped: [`NotExactlyOne`](SqlError::NotExactlyOne),
//! [`Decode`](SqlError::Decode), [`Driver`](SqlError::Driver),
//! [`Pool`](SqlError::Pool).

use crate::compile::Query;
use thiserror::Error;

/// Result type alias for pgshape operations.
pub type SqlResult<T> = Result<T, SqlError>;

/// Error raised by fragment compilation, execution, or result shaping.
///
/// Propagation is fail-fast: the engine never retries, and driver errors are
/// passed through unchanged.
#[derive(Debug, Error)]
pub enum SqlError {
    /// `self_column()` was interpolated where no column is in scope
    /// (outside a values map or predicate map entry).
    #[error("`self` column reference used outside a column-bound context")]
    SelfWithoutColumn,

    /// A parent-column reference was compiled outside a lateral sub-query
    /// (no parent-table alias in scope).
    #[error("parent column reference used outside a lateral sub-query")]
    ParentWithoutTable,

    /// `select_exactly_one` matched no rows. Carries the compiled query for
    /// diagnosis.
    #[error("expected exactly one row from: {}", .query.text)]
    NotExactlyOne {
        /// The query that produced no rows.
        query: Query,
    },

    /// Row decode / result-shaping error.
    #[error("decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Anything raised by the queryable, propagated unchanged.
    #[error("driver error: {0}")]
    Driver(#[from] tokio_postgres::Error),

    /// Connection error (configuration or network).
    #[error("connection error: {0}")]
    Connection(String),

    /// Pool error (exhaustion or misconfiguration).
    #[cfg(feature = "pool")]
    #[error("pool error: {0}")]
    Pool(String),
}

impl SqlError {
    /// Create a decode error for a specific column.
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a not-exactly-one error.
    pub fn is_not_exactly_one(&self) -> bool {
        matches!(self, Self::NotExactlyOne { .. })
    }

    /// Return the PostgreSQL SQLSTATE code if this error originated from the
    /// database, `None` otherwise.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Driver(e) => e.as_db_error().map(|db| db.code().code()),
            _ => None,
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for SqlError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
