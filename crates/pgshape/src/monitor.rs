//! Query execution monitoring.
//!
//! A [`QueryMonitor`] attached to a queryable (via
//! [`Monitored`](crate::Monitored)) observes every `run`: the compiled query
//! before the driver is invoked, and the shaped result afterwards with a
//! monotonic elapsed-time measurement. Both callbacks carry the queryable's
//! transaction id when one is set.

use crate::compile::Query;
use serde_json::Value;
use std::time::Duration;

/// Trait for observing query execution.
pub trait QueryMonitor: Send + Sync {
    /// Called with the compiled query before the driver is invoked. Fires for
    /// no-op fragments too.
    fn on_query(&self, _query: &Query, _transaction_id: Option<u64>) {}

    /// Called after the result transform has been applied (or the no-op
    /// result returned).
    fn on_result(
        &self,
        _query: &Query,
        _result: &Value,
        _elapsed: Duration,
        _transaction_id: Option<u64>,
    ) {
    }
}

/// A `tracing`-based monitor that logs compiled SQL before execution and
/// timing afterwards.
///
/// Enable via the crate feature: `pgshape = { features = ["tracing"] }`.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone)]
pub struct TracingMonitor {
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

#[cfg(feature = "tracing")]
impl Default for TracingMonitor {
    fn default() -> Self {
        Self {
            max_sql_length: Some(200),
        }
    }
}

#[cfg(feature = "tracing")]
impl TracingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn truncate<'a>(&self, sql: &'a str) -> &'a str {
        let Some(max) = self.max_sql_length else {
            return sql;
        };
        if sql.len() <= max {
            return sql;
        }
        let mut end = max;
        while end > 0 && !sql.is_char_boundary(end) {
            end -= 1;
        }
        &sql[..end]
    }
}

#[cfg(feature = "tracing")]
impl QueryMonitor for TracingMonitor {
    fn on_query(&self, query: &Query, transaction_id: Option<u64>) {
        tracing::debug!(
            target: "pgshape.sql",
            sql = %self.truncate(&query.text),
            param_count = query.params.len(),
            prepared = query.name.as_deref().unwrap_or("-"),
            txn = transaction_id,
        );
    }

    fn on_result(
        &self,
        query: &Query,
        _result: &Value,
        elapsed: Duration,
        transaction_id: Option<u64>,
    ) {
        tracing::debug!(
            target: "pgshape.sql",
            sql = %self.truncate(&query.text),
            elapsed_ms = elapsed.as_millis() as u64,
            txn = transaction_id,
        );
    }
}
