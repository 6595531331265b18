//! DELETE builder.

use super::{push_extras, push_row_selector, push_where};
use crate::client::Queryable;
use crate::error::SqlResult;
use crate::expr::{ValueMap, WhereSpec};
use crate::fragment::{sql, SqlFragment};
use crate::transform::RunTransform;
use serde_json::Value;

/// Delete rows matching a predicate, returning the deleted rows as JSON.
pub fn delete(table: &str, where_: impl Into<WhereSpec>) -> Delete {
    Delete {
        table: table.to_string(),
        where_: where_.into(),
        returning: None,
        extras: ValueMap::new(),
    }
}

/// DELETE statement builder.
#[derive(Clone, Debug)]
pub struct Delete {
    table: String,
    where_: WhereSpec,
    returning: Option<Vec<String>>,
    extras: ValueMap,
}

impl Delete {
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
        let mut fragment = sql("DELETE FROM ");
        fragment.push_ident(&self.table);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[test]
    fn delete_with_predicate() {
        let q = delete("users", values! { "id" => 9_i64 })
            .fragment()
            .compile()
            .unwrap();
        assert_eq!(
            q.text,
            r#"DELETE FROM "users" WHERE ("id" = $1) RETURNING to_jsonb("users".*) AS result"#
        );
    }

    #[test]
    fn delete_all_omits_where() {
        let q = delete("sessions", WhereSpec::All).fragment().compile().unwrap();
        assert_eq!(
            q.text,
            r#"DELETE FROM "sessions" RETURNING to_jsonb("sessions".*) AS result"#
        );
    }
}
