//! TRUNCATE builder.

use crate::client::Queryable;
use crate::error::SqlResult;
use crate::fragment::{sql, SqlFragment};
use crate::transform::RunTransform;
use serde_json::Value;

/// Truncate one or more tables. Identity and foreign-key options render in
/// the order the caller adds them.
pub fn truncate(tables: &[&str]) -> Truncate {
    Truncate {
        tables: tables.iter().map(|t| t.to_string()).collect(),
        options: Vec::new(),
    }
}

/// TRUNCATE statement builder.
#[derive(Clone, Debug)]
pub struct Truncate {
    tables: Vec<String>,
    options: Vec<&'static str>,
}

impl Truncate {
    pub fn continue_identity(mut self) -> Self {
        self.options.push("CONTINUE IDENTITY");
        self
    }

    pub fn restart_identity(mut self) -> Self {
        self.options.push("RESTART IDENTITY");
        self
    }

    pub fn restrict(mut self) -> Self {
        self.options.push("RESTRICT");
        self
    }

    pub fn cascade(mut self) -> Self {
        self.options.push("CASCADE");
        self
    }

    /// Emit the fragment.
    pub fn fragment(self) -> SqlFragment {
        let mut fragment = sql("TRUNCATE ");
        for (i, table) in self.tables.iter().enumerate() {
            if i > 0 {
                fragment.push(", ");
            }
            fragment.push_ident(table);
        }
        for option in &self.options {
            fragment.push(" ").push(option);
        }
        fragment.set_transform(RunTransform::None);
        fragment
    }

    /// Emit, compile, execute, and reshape in one call.
    pub async fn run<C: Queryable>(self, conn: &C) -> SqlResult<Value> {
        self.fragment().run(conn).await
    }
}
