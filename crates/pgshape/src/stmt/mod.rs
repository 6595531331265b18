//! Shortcut statement builders.
//!
//! Each builder assembles a [`SqlFragment`](crate::SqlFragment) with the
//! appropriate result transform wired in, so `builder.run(&client)` returns
//! already-shaped JSON. Everything a builder emits goes through the same
//! fragment compiler as hand-written SQL.

mod delete;
mod insert;
mod select;
mod truncate;
mod update;
mod upsert;

#[cfg(test)]
mod tests;

pub use delete::{delete, Delete};
pub use insert::{insert, insert_many, Insert};
pub use select::{
    avg, count, max, min, select, select_exactly_one, select_one, sum, Distinct, Lock, LockStrength,
    LockWait, OrderDirection, OrderNulls, OrderSpec, Select, SelectMode,
};
pub use truncate::{truncate, Truncate};
pub use update::{update, Update};
pub use upsert::{upsert, upsert_many, ConflictTarget, NoNullUpdateColumns, Upsert};

use crate::expr::{ColumnValue, Sql, ValueMap, WhereSpec};
use crate::fragment::SqlFragment;
use std::collections::BTreeSet;

/// The sorted union of the keys of all rows.
pub(crate) fn column_union(rows: &[ValueMap]) -> Vec<String> {
    let mut columns = BTreeSet::new();
    for row in rows {
        for key in row.keys() {
            columns.insert(key.clone());
        }
    }
    columns.into_iter().collect()
}

/// One `VALUES` tuple for the given column list; columns the row does not
/// supply fall back to `DEFAULT`.
pub(crate) fn row_values(columns: &[String], row: &ValueMap) -> Sql {
    Sql::ColumnValues(
        columns
            .iter()
            .map(|column| ColumnValue {
                column: Some(column.clone()),
                value: row.get(column).cloned().unwrap_or(Sql::Default),
            })
            .collect(),
    )
}

/// The row-level JSON selector: `to_jsonb("q".*)` for the full row, or
/// `jsonb_build_object($k::text, "col", …)` for a restricted column list.
pub(crate) fn push_row_selector(
    fragment: &mut SqlFragment,
    qualifier: &str,
    columns: &Option<Vec<String>>,
) {
    match columns {
        None => {
            fragment.push("to_jsonb(").push_ident(qualifier).push(".*)");
        }
        Some(columns) => {
            fragment.push("jsonb_build_object(");
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    fragment.push(", ");
                }
                fragment
                    .push_bind(column.clone())
                    .push("::text, ")
                    .push_ident(column);
            }
            fragment.push(")");
        }
    }
}

/// Merge an extras map into the row JSON: `|| jsonb_build_object($k::text,
/// <expr>, …)` with keys in sorted order.
pub(crate) fn push_extras(fragment: &mut SqlFragment, extras: &ValueMap) {
    if extras.is_empty() {
        return;
    }
    fragment.push(" || jsonb_build_object(");
    for (i, (key, value)) in extras.iter().enumerate() {
        if i > 0 {
            fragment.push(", ");
        }
        fragment
            .push_bind(key.clone())
            .push("::text, ")
            .push_expr(value.clone());
    }
    fragment.push(")");
}

/// Append a `WHERE` clause, omitted entirely for [`WhereSpec::All`].
pub(crate) fn push_where(fragment: &mut SqlFragment, where_: WhereSpec) {
    match where_ {
        WhereSpec::All => {}
        WhereSpec::Map(map) => {
            fragment.push(" WHERE ").push_predicate(map);
        }
        WhereSpec::Fragment(condition) => {
            fragment.push(" WHERE ").push_fragment(condition);
        }
    }
}
