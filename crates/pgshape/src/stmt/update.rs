//! UPDATE builder.

use super::{push_extras, push_row_selector, push_where, row_values};
use crate::client::Queryable;
use crate::error::SqlResult;
use crate::expr::{Sql, ValueMap, WhereSpec};
use crate::fragment::{sql, SqlFragment};
use crate::transform::RunTransform;
use serde_json::Value;

/// Update rows matching a predicate.
///
/// The `SET (cols) = ROW(vals)` form is used so single-column updates stay
/// valid SQL.
///
/// ```ignore
/// let updated = update("users", values! { "name" => "Y" }, values! { "id" => 1_i64 })
///     .run(&client)
///     .await?;
/// ```
pub fn update(table: &str, values: ValueMap, where_: impl Into<WhereSpec>) -> Update {
    Update {
        table: table.to_string(),
        values,
        where_: where_.into(),
        returning: None,
        extras: ValueMap::new(),
    }
}

/// UPDATE statement builder.
#[derive(Clone, Debug)]
pub struct Update {
    table: String,
    values: ValueMap,
    where_: WhereSpec,
    returning: Option<Vec<String>>,
    extras: ValueMap,
}

impl Update {
    /// Restrict the returned JSON object to these columns.
    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Merge extra `{name: expression}` pairs into each returned JSON object.
    pub fn extras(mut self, extras: ValueMap) -> Self {
        self.extras = extras;
        self
    }

    /// Emit the fragment.
    pub fn fragment(self) -> SqlFragment {
        let columns: Vec<String> = self.values.keys().cloned().collect();
        let mut fragment = sql("UPDATE ");
        fragment
            .push_ident(&self.table)
            .push(" SET (")
            .push_expr(Sql::ColumnNames(columns.clone()))
            .push(") = ROW(")
            .push_expr(row_values(&columns, &self.values))
            .push(")");
        push_where(&mut fragment, self.where_);
        fragment.push(" RETURNING ");
        push_row_selector(&mut fragment, &self.table, &self.returning);
        push_extras(&mut fragment, &self.extras);
        fragment.push(" AS result");
        fragment.set_transform(RunTransform::ResultMany);
        fragment
    }

    /// Emit, compile, execute, and reshape in one call.
    pub async fn run<C: Queryable>(self, conn: &C) -> SqlResult<Value> {
        self.fragment().run(conn).await
    }
}
