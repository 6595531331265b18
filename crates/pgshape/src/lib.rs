//! # pgshape
//!
//! A typed SQL builder and result-shaping engine for PostgreSQL.
//!
//! ## Features
//!
//! - **Composable fragments**: literal SQL interleaved with typed
//!   interpolations; compilation to `$1, $2, …` placeholders is automatic
//! - **Shortcut builders**: `insert` / `upsert` / `update` / `delete` /
//!   `truncate` / `select` family, all emitting plain [`SqlFragment`]s
//! - **Result shaping**: every query returns JSON; selects aggregate nested
//!   result trees server-side via `LEFT JOIN LATERAL` in a single round-trip
//! - **Explicit monitoring**: attach a [`QueryMonitor`] to a connection
//!   wrapper instead of mutating process-wide state
//! - **Pooling**: optional `deadpool-postgres` support (feature: `pool`)
//!
//! ## Composing SQL
//!
//! ```ignore
//! use pgshape::{select, values, WhereSpec, parent, OrderSpec};
//!
//! let authors_with_books = select("authors", WhereSpec::All)
//!     .order(OrderSpec::asc("name"))
//!     .lateral("books", select("books", values! { "author_id" => parent("id") }))
//!     .run(&client)
//!     .await?;
//! ```
//!
//! ## Hand-written fragments
//!
//! ```ignore
//! use pgshape::{sql, values};
//!
//! let mut q = sql("SELECT * FROM ");
//! q.push_ident("users").push(" WHERE ").push_predicate(values! { "id" => 1_i64 });
//! let rows = q.run(&client).await?;
//! ```

mod client;
mod compile;
mod error;
mod expr;
mod fragment;
mod ident;
mod monitor;
mod param;
pub mod prelude;
mod row;
mod stmt;
mod transform;

#[cfg(feature = "pool")]
mod pool;

pub use client::{next_transaction_id, JsonRow, Monitored, Queryable};
pub use compile::Query;
pub use error::{SqlError, SqlResult};
pub use expr::{parent, parent_column, self_column, ColumnValue, Sql, ValueMap, WhereSpec};
pub use fragment::{sql, SqlFragment};
pub use ident::{camel_case, quote_ident, snake_case};
pub use monitor::QueryMonitor;
pub use param::{Cast, Param, ParamList};
pub use row::{row_to_json, rows_to_json};
pub use stmt::{
    avg, count, delete, insert, insert_many, max, min, select, select_exactly_one, select_one,
    sum, truncate, update, upsert, upsert_many, ConflictTarget, Delete, Distinct, Insert, Lock,
    LockStrength, LockWait, NoNullUpdateColumns, OrderDirection, OrderNulls, OrderSpec, Select,
    SelectMode, Truncate, Update, Upsert,
};
pub use transform::RunTransform;

#[cfg(feature = "pool")]
pub use client::PoolClient;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};

#[cfg(feature = "tracing")]
pub use monitor::TracingMonitor;
