//! INSERT … ON CONFLICT builder.

use super::{column_union, insert_many, push_extras, push_row_selector, row_values};
use crate::client::Queryable;
use crate::error::SqlResult;
use crate::expr::{ColumnValue, Sql, ValueMap};
use crate::fragment::{sql, SqlFragment};
use crate::transform::RunTransform;
use serde_json::Value;

/// The conflict arbiter: a column list or a named unique constraint.
#[derive(Clone, Debug)]
pub enum ConflictTarget {
    Columns(Vec<String>),
    Constraint(String),
}

impl ConflictTarget {
    pub fn columns(columns: &[&str]) -> Self {
        ConflictTarget::Columns(columns.iter().map(|c| c.to_string()).collect())
    }

    pub fn constraint(name: &str) -> Self {
        ConflictTarget::Constraint(name.to_string())
    }
}

impl From<&str> for ConflictTarget {
    fn from(column: &str) -> Self {
        ConflictTarget::Columns(vec![column.to_string()])
    }
}

impl From<&[&str]> for ConflictTarget {
    fn from(columns: &[&str]) -> Self {
        ConflictTarget::columns(columns)
    }
}

/// Columns whose existing value survives when the incoming value is `NULL`.
#[derive(Clone, Debug, Default)]
pub enum NoNullUpdateColumns {
    #[default]
    None,
    All,
    Columns(Vec<String>),
}

impl NoNullUpdateColumns {
    fn contains(&self, column: &str) -> bool {
        match self {
            NoNullUpdateColumns::None => false,
            NoNullUpdateColumns::All => true,
            NoNullUpdateColumns::Columns(columns) => columns.iter().any(|c| c == column),
        }
    }
}

/// Upsert a single row.
///
/// ```ignore
/// upsert("t", values! { "id" => 1, "v" => "a" }, "id")
///     .no_null_update_columns(&["v"])
///     .run(&client)
///     .await?;
/// ```
pub fn upsert(table: &str, values: ValueMap, target: impl Into<ConflictTarget>) -> Upsert {
    Upsert::new(table, UpsertSource::Single(values), target.into())
}

/// Upsert many rows. An empty vector delegates to the no-op insert.
pub fn upsert_many(table: &str, rows: Vec<ValueMap>, target: impl Into<ConflictTarget>) -> Upsert {
    Upsert::new(table, UpsertSource::Many(rows), target.into())
}

#[derive(Clone, Debug)]
enum UpsertSource {
    Single(ValueMap),
    Many(Vec<ValueMap>),
}

/// INSERT … ON CONFLICT statement builder.
#[derive(Clone, Debug)]
pub struct Upsert {
    table: String,
    source: UpsertSource,
    target: ConflictTarget,
    update_values: ValueMap,
    update_columns: Option<Vec<String>>,
    no_null_update_columns: NoNullUpdateColumns,
    report_action: bool,
    returning: Option<Vec<String>>,
    extras: ValueMap,
}

impl Upsert {
    fn new(table: &str, source: UpsertSource, target: ConflictTarget) -> Self {
        Self {
            table: table.to_string(),
            source,
            target,
            update_values: ValueMap::new(),
            update_columns: None,
            no_null_update_columns: NoNullUpdateColumns::default(),
            report_action: true,
            returning: None,
            extras: ValueMap::new(),
        }
    }

    /// Override the expressions assigned on conflict. A supplied value takes
    /// precedence over the default `EXCLUDED.<col>`.
    pub fn update_values(mut self, values: ValueMap) -> Self {
        self.update_values = values;
        self
    }

    /// Restrict which columns the conflict update assigns. Defaults to the
    /// full inserted column set.
    pub fn update_columns(mut self, columns: &[&str]) -> Self {
        self.update_columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Keep the existing value for these columns when the incoming value is
    /// `NULL`.
    pub fn no_null_update_columns(mut self, columns: &[&str]) -> Self {
        self.no_null_update_columns =
            NoNullUpdateColumns::Columns(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Keep every column's existing value when the incoming value is `NULL`.
    pub fn no_null_update_all(mut self) -> Self {
        self.no_null_update_columns = NoNullUpdateColumns::All;
        self
    }

    /// Omit the `$action` key from the returned JSON.
    pub fn suppress_action(mut self) -> Self {
        self.report_action = false;
        self
    }

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
        let (rows, single) = match self.source {
            UpsertSource::Single(ref values) => (vec![values.clone()], true),
            UpsertSource::Many(ref rows) => {
                if rows.is_empty() {
                    return insert_many(&self.table, Vec::new()).fragment();
                }
                (rows.clone(), false)
            }
        };

        let columns = column_union(&rows);
        let mut fragment = sql("INSERT INTO ");
        fragment
            .push_ident(&self.table)
            .push(" (")
            .push_expr(Sql::ColumnNames(columns.clone()))
            .push(") VALUES ");
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                fragment.push(", ");
            }
            fragment.push("(").push_expr(row_values(&columns, row)).push(")");
        }

        fragment.push(" ON CONFLICT ");
        match &self.target {
            ConflictTarget::Columns(target_columns) => {
                fragment
                    .push("(")
                    .push_expr(Sql::ColumnNames(target_columns.clone()))
                    .push(")");
            }
            ConflictTarget::Constraint(name) => {
                fragment.push("ON CONSTRAINT ").push_ident(name);
            }
        }

        // Update columns: the specified list (default: every inserted column)
        // unioned with the keys of update_values, first-seen order kept.
        let mut update_columns = self.update_columns.clone().unwrap_or_else(|| columns.clone());
        for key in self.update_values.keys() {
            if !update_columns.iter().any(|c| c == key) {
                update_columns.push(key.clone());
            }
        }

        if update_columns.is_empty() {
            fragment.push(" DO NOTHING");
        } else {
            fragment
                .push(" DO UPDATE SET (")
                .push_expr(Sql::ColumnNames(update_columns.clone()))
                .push(") = ROW(");
            let assignments: Vec<ColumnValue> = update_columns
                .iter()
                .map(|column| ColumnValue {
                    column: Some(column.clone()),
                    value: self.update_assignment(column),
                })
                .collect();
            fragment.push_expr(Sql::ColumnValues(assignments)).push(")");
        }

        fragment.push(" RETURNING ");
        push_row_selector(&mut fragment, &self.table, &self.returning);
        push_extras(&mut fragment, &self.extras);
        if self.report_action {
            // xmax is zero on freshly inserted tuples, nonzero on updated
            // ones.
            fragment.push(
                " || jsonb_build_object('$action', CASE xmax WHEN 0 THEN 'INSERT' ELSE 'UPDATE' END)",
            );
        }
        fragment.push(" AS result");

        fragment.set_transform(if single {
            // DO NOTHING can swallow the row entirely.
            RunTransform::ResultOptional
        } else {
            RunTransform::ResultMany
        });
        fragment
    }

    fn update_assignment(&self, column: &str) -> Sql {
        if self.no_null_update_columns.contains(column) {
            let mut case = sql("CASE WHEN EXCLUDED.");
            case.push_ident(column)
                .push(" IS NULL THEN ")
                .push_ident(&self.table)
                .push(".")
                .push_ident(column)
                .push(" ELSE EXCLUDED.")
                .push_ident(column)
                .push(" END");
            return case.embed();
        }
        if let Some(value) = self.update_values.get(column) {
            return value.clone();
        }
        let mut excluded = sql("EXCLUDED.");
        excluded.push_ident(column);
        excluded.embed()
    }

    /// Emit, compile, execute, and reshape in one call.
    pub async fn run<C: Queryable>(self, conn: &C) -> SqlResult<Value> {
        self.fragment().run(conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[test]
    fn no_null_update_column_renders_case() {
        let q = upsert("t", values! { "id" => 1_i32, "v" => "a" }, "id")
            .no_null_update_columns(&["v"])
            .fragment()
            .compile()
            .unwrap();
        assert!(q.text.contains(
            r#"CASE WHEN EXCLUDED."v" IS NULL THEN "t"."v" ELSE EXCLUDED."v" END"#
        ));
        assert!(q.text.contains(
            r#"jsonb_build_object('$action', CASE xmax WHEN 0 THEN 'INSERT' ELSE 'UPDATE' END)"#
        ));
        assert_eq!(format!("{:?}", q.params), r#"[1, "a"]"#);
    }

    #[test]
    fn full_text_of_simple_upsert() {
        let q = upsert("t", values! { "id" => 1_i32, "v" => "a" }, "id")
            .fragment()
            .compile()
            .unwrap();
        assert_eq!(
            q.text,
            r#"INSERT INTO "t" ("id", "v") VALUES ($1, $2) ON CONFLICT ("id") DO UPDATE SET ("id", "v") = ROW(EXCLUDED."id", EXCLUDED."v") RETURNING to_jsonb("t".*) || jsonb_build_object('$action', CASE xmax WHEN 0 THEN 'INSERT' ELSE 'UPDATE' END) AS result"#
        );
    }

    #[test]
    fn constraint_target_renders_on_constraint() {
        let q = upsert("t", values! { "id" => 1_i32 }, ConflictTarget::constraint("t_pkey"))
            .fragment()
            .compile()
            .unwrap();
        assert!(q.text.contains(r#"ON CONFLICT ON CONSTRAINT "t_pkey" DO UPDATE"#));
    }

    #[test]
    fn empty_update_column_set_does_nothing() {
        let q = upsert("t", values! { "id" => 1_i32 }, "id")
            .update_columns(&[])
            .fragment()
            .compile()
            .unwrap();
        assert!(q.text.contains("DO NOTHING"));
        assert!(!q.text.contains("DO UPDATE"));
    }

    #[test]
    fn update_values_override_excluded() {
        let q = upsert("t", values! { "id" => 1_i32, "v" => "a" }, "id")
            .update_values(values! { "updated_at" => sql("now()").embed() })
            .fragment()
            .compile()
            .unwrap();
        assert!(q.text.contains(
            r#"DO UPDATE SET ("id", "v", "updated_at") = ROW(EXCLUDED."id", EXCLUDED."v", now())"#
        ));
    }

    #[test]
    fn suppress_action_omits_action_key() {
        let q = upsert("t", values! { "id" => 1_i32 }, "id")
            .suppress_action()
            .fragment()
            .compile()
            .unwrap();
        assert!(!q.text.contains("$action"));
        assert!(q.text.ends_with(r#"RETURNING to_jsonb("t".*) AS result"#));
    }

    #[test]
    fn empty_rows_delegate_to_noop_insert() {
        let fragment = upsert_many("t", vec![], "id").fragment();
        assert!(fragment.is_noop());
    }
}
