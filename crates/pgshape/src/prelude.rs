//! Convenience re-exports for callers that want everything in scope.

pub use crate::{
    avg, count, delete, insert, insert_many, max, min, parent, parent_column, select,
    select_exactly_one, select_one, self_column, sql, sum, truncate, update, upsert, upsert_many,
    ConflictTarget, Lock, Monitored, OrderSpec, Param, Queryable, Sql, SqlError, SqlFragment,
    SqlResult, ValueMap, WhereSpec,
};
