//! INSERT builder.

use super::{column_union, push_extras, push_row_selector, row_values};
use crate::client::Queryable;
use crate::error::SqlResult;
use crate::expr::ValueMap;
use crate::fragment::{sql, SqlFragment};
use crate::transform::RunTransform;
use serde_json::Value;

/// Insert a single row. The value map's keys become the column list in
/// sorted order.
///
/// ```ignore
/// let user = insert("users", values! { "email" => "x@y", "name" => "X" })
///     .run(&client)
///     .await?;
/// ```
pub fn insert(table: &str, values: ValueMap) -> Insert {
    Insert {
        table: table.to_string(),
        source: InsertSource::Single(values),
        returning: None,
        extras: ValueMap::new(),
    }
}

/// Insert many rows in one statement. The column list is the sorted union of
/// all row keys; a row missing a key supplies `DEFAULT` for it. An empty
/// vector produces a no-op fragment that yields `[]` without a round-trip
/// (unless the run is forced).
pub fn insert_many(table: &str, rows: Vec<ValueMap>) -> Insert {
    Insert {
        table: table.to_string(),
        source: InsertSource::Many(rows),
        returning: None,
        extras: ValueMap::new(),
    }
}

#[derive(Clone, Debug)]
pub(crate) enum InsertSource {
    Single(ValueMap),
    Many(Vec<ValueMap>),
}

/// INSERT statement builder.
#[derive(Clone, Debug)]
pub struct Insert {
    table: String,
    source: InsertSource,
    returning: Option<Vec<String>>,
    extras: ValueMap,
}

impl Insert {
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
        match self.source {
            InsertSource::Many(rows) if rows.is_empty() => {
                // Degenerate case: nothing to insert. The SQL only exists for
                // forced runs; a normal run returns the stored empty array.
                let mut fragment = sql("INSERT INTO ");
                fragment.push_ident(&self.table).push(" SELECT null WHERE false");
                fragment.set_transform(RunTransform::ResultMany);
                fragment.set_noop_result(Value::Array(Vec::new()));
                fragment
            }
            InsertSource::Many(rows) => {
                let columns = column_union(&rows);
                let mut fragment = insert_head(&self.table, &columns);
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        fragment.push(", ");
                    }
                    fragment.push("(").push_expr(row_values(&columns, row)).push(")");
                }
                push_returning(&mut fragment, &self.table, &self.returning, &self.extras);
                fragment.set_transform(RunTransform::ResultMany);
                fragment
            }
            InsertSource::Single(values) => {
                let columns: Vec<String> = values.keys().cloned().collect();
                let mut fragment = insert_head(&self.table, &columns);
                fragment.push("(").push_expr(row_values(&columns, &values)).push(")");
                push_returning(&mut fragment, &self.table, &self.returning, &self.extras);
                fragment.set_transform(RunTransform::ResultOne);
                fragment
            }
        }
    }

    /// Emit, compile, execute, and reshape in one call.
    pub async fn run<C: Queryable>(self, conn: &C) -> SqlResult<Value> {
        self.fragment().run(conn).await
    }
}

fn insert_head(table: &str, columns: &[String]) -> SqlFragment {
    let mut fragment = sql("INSERT INTO ");
    fragment
        .push_ident(table)
        .push(" (")
        .push_expr(crate::expr::Sql::ColumnNames(columns.to_vec()))
        .push(") VALUES ");
    fragment
}

pub(crate) fn push_returning(
    fragment: &mut SqlFragment,
    table: &str,
    returning: &Option<Vec<String>>,
    extras: &ValueMap,
) {
    fragment.push(" RETURNING ");
    push_row_selector(fragment, table, returning);
    push_extras(fragment, extras);
    fragment.push(" AS result");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Sql;
    use crate::values;

    #[test]
    fn single_row_insert() {
        let q = insert("users", values! { "email" => "x@y", "name" => "X" })
            .fragment()
            .compile()
            .unwrap();
        assert_eq!(
            q.text,
            r#"INSERT INTO "users" ("email", "name") VALUES ($1, $2) RETURNING to_jsonb("users".*) AS result"#
        );
        assert_eq!(format!("{:?}", q.params), r#"["x@y", "X"]"#);
    }

    #[test]
    fn empty_array_is_noop() {
        let fragment = insert_many("users", vec![]).fragment();
        assert!(fragment.is_noop());
        assert_eq!(fragment.noop_result(), Some(&serde_json::json!([])));
        assert_eq!(
            fragment.compile().unwrap().text,
            r#"INSERT INTO "users" SELECT null WHERE false"#
        );
    }

    #[test]
    fn multi_row_unions_keys_and_fills_default() {
        let q = insert_many(
            "users",
            vec![
                values! { "email" => "a@x", "name" => "A" },
                values! { "email" => "b@x" },
            ],
        )
        .fragment()
        .compile()
        .unwrap();
        assert_eq!(
            q.text,
            r#"INSERT INTO "users" ("email", "name") VALUES ($1, $2), ($3, DEFAULT) RETURNING to_jsonb("users".*) AS result"#
        );
        assert_eq!(format!("{:?}", q.params), r#"["a@x", "A", "b@x"]"#);
    }

    #[test]
    fn returning_columns_use_text_params() {
        let q = insert("users", values! { "email" => "x@y" })
            .returning(&["id", "email"])
            .fragment()
            .compile()
            .unwrap();
        assert_eq!(
            q.text,
            r#"INSERT INTO "users" ("email") VALUES ($1) RETURNING jsonb_build_object($2::text, "id", $3::text, "email") AS result"#
        );
    }

    #[test]
    fn extras_merge_into_returning() {
        let mut distance = sql("");
        distance.push("0.0");
        let q = insert("sites", values! { "name" => "hq" })
            .extras(values! { "distance" => distance.embed() })
            .fragment()
            .compile()
            .unwrap();
        assert_eq!(
            q.text,
            r#"INSERT INTO "sites" ("name") VALUES ($1) RETURNING to_jsonb("sites".*) || jsonb_build_object($2::text, 0.0) AS result"#
        );
    }

    #[test]
    fn explicit_default_sentinel() {
        let q = insert("users", values! { "email" => "x@y", "kind" => Sql::Default })
            .fragment()
            .compile()
            .unwrap();
        assert_eq!(
            q.text,
            r#"INSERT INTO "users" ("email", "kind") VALUES ($1, DEFAULT) RETURNING to_jsonb("users".*) AS result"#
        );
    }
}
