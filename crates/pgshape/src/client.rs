//! The queryable contract and client adapters.
//!
//! Anything that can execute a compiled [`Query`] and hand back rows as JSON
//! maps is a [`Queryable`]: a `tokio_postgres` client or transaction, a
//! pooled client, or a [`Monitored`] wrapper that decorates another queryable
//! with a [`QueryMonitor`] and a transaction id.

use crate::compile::Query;
use crate::error::SqlResult;
use crate::monitor::QueryMonitor;
use crate::row::rows_to_json;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One driver row, converted to a JSON object keyed by column name.
pub type JsonRow = serde_json::Map<String, Value>;

static TRANSACTION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Mint a fresh transaction id for tagging monitor callbacks.
pub fn next_transaction_id() -> u64 {
    TRANSACTION_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// A connection-like value the engine can execute compiled queries against.
///
/// The prepared-statement name on [`Query`] is advisory: the bundled adapters
/// rely on `tokio-postgres`'s internal statement cache and ignore it, but
/// external pools may key on it.
pub trait Queryable: Send + Sync {
    /// Execute the query and return its rows as JSON maps.
    fn query(
        &self,
        query: &Query,
    ) -> impl std::future::Future<Output = SqlResult<Vec<JsonRow>>> + Send;

    /// The transaction id monitor callbacks are tagged with. Plain
    /// connections have none; the transaction helper decorates its clients
    /// with one.
    fn transaction_id(&self) -> Option<u64> {
        None
    }

    /// The monitor observing runs on this queryable, if any.
    fn monitor(&self) -> Option<&dyn QueryMonitor> {
        None
    }
}

impl Queryable for tokio_postgres::Client {
    async fn query(&self, query: &Query) -> SqlResult<Vec<JsonRow>> {
        let params = query.params.as_refs();
        let rows = tokio_postgres::Client::query(self, &query.text, &params).await?;
        rows_to_json(&rows)
    }
}

impl Queryable for tokio_postgres::Transaction<'_> {
    async fn query(&self, query: &Query) -> SqlResult<Vec<JsonRow>> {
        let params = query.params.as_refs();
        let rows = tokio_postgres::Transaction::query(self, &query.text, &params).await?;
        rows_to_json(&rows)
    }
}

/// Wrapper for `deadpool_postgres::Client`.
#[cfg(feature = "pool")]
pub struct PoolClient(deadpool_postgres::Client);

#[cfg(feature = "pool")]
impl PoolClient {
    pub fn new(client: deadpool_postgres::Client) -> Self {
        Self(client)
    }

    pub fn inner(&self) -> &deadpool_postgres::Client {
        &self.0
    }

    pub fn into_inner(self) -> deadpool_postgres::Client {
        self.0
    }
}

#[cfg(feature = "pool")]
impl Queryable for PoolClient {
    async fn query(&self, query: &Query) -> SqlResult<Vec<JsonRow>> {
        let params = query.params.as_refs();
        let rows = self.0.query(&query.text, &params).await?;
        rows_to_json(&rows)
    }
}

/// A queryable decorated with a monitor and an optional transaction id.
///
/// This is the explicit context that replaces any process-wide listener
/// state: attach the monitor where the connection lives, and every `run`
/// through it reports there.
pub struct Monitored<C> {
    client: C,
    monitor: Option<Arc<dyn QueryMonitor>>,
    transaction_id: Option<u64>,
}

impl<C: Queryable> Monitored<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            monitor: None,
            transaction_id: None,
        }
    }

    /// Attach a monitor.
    pub fn with_monitor<M: QueryMonitor + 'static>(self, monitor: M) -> Self {
        self.with_monitor_arc(Arc::new(monitor))
    }

    /// Attach a monitor from an `Arc`.
    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Tag runs through this queryable with a transaction id.
    pub fn with_transaction_id(mut self, id: u64) -> Self {
        self.transaction_id = Some(id);
        self
    }

    pub fn inner(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }
}

impl<C: Queryable> Queryable for Monitored<C> {
    fn query(
        &self,
        query: &Query,
    ) -> impl std::future::Future<Output = SqlResult<Vec<JsonRow>>> + Send {
        self.client.query(query)
    }

    fn transaction_id(&self) -> Option<u64> {
        self.transaction_id.or_else(|| self.client.transaction_id())
    }

    fn monitor(&self) -> Option<&dyn QueryMonitor> {
        self.monitor.as_deref().or_else(|| self.client.monitor())
    }
}

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$client.transaction().await`.
/// - Binds `$tx` to a [`Monitored`] wrapper around it, tagged with a fresh
///   transaction id so monitor callbacks can correlate the queries inside.
/// - Commits on `Ok(_)`, rolls back on `Err(_)`.
///
/// The block must evaluate to `pgshape::SqlResult<T>`.
///
/// ```ignore
/// pgshape::transaction!(&mut client, tx, {
///     update("accounts", values! { "balance" => 0_i64 }, values! { "id" => 1_i64 })
///         .run(&tx)
///         .await?;
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let __pgshape_tx = ($client)
            .transaction()
            .await
            .map_err($crate::SqlError::Driver)?;
        let $tx = $crate::Monitored::new(__pgshape_tx)
            .with_transaction_id($crate::next_transaction_id());

        let __pgshape_body_result = async { $body }.await;
        let __pgshape_tx = $tx.into_inner();
        match __pgshape_body_result {
            Ok(value) => {
                __pgshape_tx
                    .commit()
                    .await
                    .map_err($crate::SqlError::Driver)?;
                Ok(value)
            }
            Err(error) => match __pgshape_tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::SqlError::Connection(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}
