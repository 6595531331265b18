//! The compositional unit: literal SQL text interleaved with typed
//! interpolations.
//!
//! A [`SqlFragment`] is built by pushing literal text and [`Sql`] expressions,
//! compiles to a [`Query`] (parameterized text plus positional parameter
//! vector), and runs against any [`Queryable`] through a single entry point
//! that also applies the fragment's result transform.
//!
//! # Example
//!
//! ```ignore
//! use pgshape::{sql, values};
//!
//! let mut q = sql("SELECT * FROM ");
//! q.push_ident("users").push(" WHERE ").push_predicate(values! { "id" => 1 });
//! let users = q.run(&client).await?;
//! ```

use crate::client::Queryable;
use crate::compile::{self, Query};
use crate::error::SqlResult;
use crate::expr::{Sql, ValueMap};
use crate::param::Param;
use crate::transform::RunTransform;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio_postgres::types::ToSql;

static PREPARED_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug)]
pub(crate) enum Part {
    Literal(String),
    Expr(Sql),
}

/// A composable SQL fragment.
///
/// Fragments are immutable once emitted by a builder: the prepared name,
/// parent-table alias, no-op result, and result transform are fixed at
/// construction time and exposed read-only.
#[derive(Clone, Debug, Default)]
pub struct SqlFragment {
    pub(crate) parts: Vec<Part>,
    pub(crate) prepared_name: Option<String>,
    pub(crate) parent_table: Option<String>,
    pub(crate) noop_result: Option<Value>,
    pub(crate) transform: RunTransform,
}

/// Start building a fragment from an initial piece of literal SQL.
pub fn sql(initial: impl Into<String>) -> SqlFragment {
    let mut fragment = SqlFragment::empty();
    fragment.push(&initial.into());
    fragment
}

impl SqlFragment {
    /// Create an empty fragment.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append literal SQL text.
    pub fn push(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(Part::Literal(last)) => last.push_str(text),
            _ => self.parts.push(Part::Literal(text.to_string())),
        }
        self
    }

    /// Append any interpolation expression.
    pub fn push_expr(&mut self, expr: impl Into<Sql>) -> &mut Self {
        self.parts.push(Part::Expr(expr.into()));
        self
    }

    /// Append a quoted identifier.
    pub fn push_ident(&mut self, ident: &str) -> &mut Self {
        self.push_expr(Sql::Ident(ident.to_string()))
    }

    /// Append a parameter placeholder and bind its value.
    pub fn push_bind<T: ToSql + Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.push_expr(Sql::Param(Param::new(value)))
    }

    /// Append a pre-built parameter.
    pub fn push_param(&mut self, param: Param) -> &mut Self {
        self.push_expr(Sql::Param(param))
    }

    /// Append another fragment, compiled recursively in place.
    pub fn push_fragment(&mut self, fragment: SqlFragment) -> &mut Self {
        self.push_expr(Sql::Fragment(Box::new(fragment)))
    }

    /// Append a predicate map: `(col₁ = v₁ AND …)` in sorted-key order,
    /// `TRUE` when empty.
    pub fn push_predicate(&mut self, map: ValueMap) -> &mut Self {
        self.push_expr(Sql::Predicate(map))
    }

    /// Wrap this fragment as an interpolation expression.
    pub fn embed(self) -> Sql {
        Sql::Fragment(Box::new(self))
    }

    /// Name this query's prepared statement, minting a fresh default name
    /// from a process-wide counter.
    pub fn prepared(self) -> Self {
        let n = PREPARED_SEQ.fetch_add(1, Ordering::Relaxed);
        self.prepared_as(format!("pgshape_{n}"))
    }

    /// Name this query's prepared statement explicitly.
    pub fn prepared_as(mut self, name: impl Into<String>) -> Self {
        self.prepared_name = Some(name.into());
        self
    }

    /// The result transform applied by [`run`](Self::run).
    pub fn transform(&self) -> &RunTransform {
        &self.transform
    }

    /// Whether this fragment skips the database unless forced.
    pub fn is_noop(&self) -> bool {
        self.noop_result.is_some()
    }

    /// The synthetic result returned when the fragment is a no-op.
    pub fn noop_result(&self) -> Option<&Value> {
        self.noop_result.as_ref()
    }

    /// The parent-table alias this fragment resolves parent-column references
    /// against, if it was spliced as a lateral sub-query.
    pub fn parent_table(&self) -> Option<&str> {
        self.parent_table.as_deref()
    }

    pub(crate) fn with_parent_table(&self, alias: &str) -> SqlFragment {
        let mut copy = self.clone();
        copy.parent_table = Some(alias.to_string());
        copy
    }

    pub(crate) fn set_transform(&mut self, transform: RunTransform) {
        self.transform = transform;
    }

    pub(crate) fn set_noop_result(&mut self, result: Value) {
        self.noop_result = Some(result);
    }

    /// Compile to parameterized SQL text plus a positional parameter vector.
    ///
    /// Compilation is pure: the same fragment tree always yields the same
    /// text and values.
    pub fn compile(&self) -> SqlResult<Query> {
        compile::compile_fragment(self)
    }

    /// Compile, execute against the queryable, and reshape the result.
    ///
    /// The queryable's monitor (if any) sees the compiled query before the
    /// driver is invoked and the shaped result afterwards, tagged with the
    /// queryable's transaction id. A no-op fragment returns its stored result
    /// without a round-trip.
    pub async fn run<C: Queryable>(&self, conn: &C) -> SqlResult<Value> {
        self.run_inner(conn, false).await
    }

    /// As [`run`](Self::run), but executes a no-op fragment anyway.
    pub async fn run_forced<C: Queryable>(&self, conn: &C) -> SqlResult<Value> {
        self.run_inner(conn, true).await
    }

    async fn run_inner<C: Queryable>(&self, conn: &C, force: bool) -> SqlResult<Value> {
        let query = self.compile()?;
        let transaction_id = conn.transaction_id();
        if let Some(monitor) = conn.monitor() {
            monitor.on_query(&query, transaction_id);
        }

        let started = Instant::now();
        let result = match (&self.noop_result, force) {
            (Some(result), false) => result.clone(),
            _ => {
                let rows = conn.query(&query).await?;
                self.transform.apply(rows, &query)?
            }
        };

        if let Some(monitor) = conn.monitor() {
            monitor.on_result(&query, &result, started.elapsed(), transaction_id);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SqlError;
    use crate::expr::{parent, self_column};
    use crate::values;

    #[test]
    fn builds_placeholders_in_order() {
        let mut q = sql("SELECT * FROM users WHERE a = ");
        q.push_bind(1_i32).push(" AND b = ").push_bind("x");

        let query = q.compile().unwrap();
        assert_eq!(query.text, "SELECT * FROM users WHERE a = $1 AND b = $2");
        assert_eq!(query.params.len(), 2);
    }

    #[test]
    fn can_compose_fragments() {
        let mut inner = SqlFragment::empty();
        inner.push(" WHERE id = ").push_bind(42_i64);

        let mut q = sql("SELECT * FROM users");
        q.push_fragment(inner);

        let query = q.compile().unwrap();
        assert_eq!(query.text, "SELECT * FROM users WHERE id = $1");
        assert_eq!(query.params.len(), 1);
    }

    #[test]
    fn placeholder_count_matches_param_vector() {
        let mut q = sql("a ");
        q.push_bind(1_i32)
            .push(" b ")
            .push_bind(2_i32)
            .push(" c ")
            .push_bind(3_i32);
        let query = q.compile().unwrap();
        for k in 1..=3 {
            assert!(query.text.contains(&format!("${k}")));
        }
        assert_eq!(query.params.len(), 3);
    }

    #[test]
    fn predicate_map_sorted_and_parenthesized() {
        let mut q = sql("SELECT * FROM t WHERE ");
        q.push_predicate(values! { "b" => 2_i32, "a" => 1_i32 });
        let query = q.compile().unwrap();
        assert_eq!(query.text, r#"SELECT * FROM t WHERE ("a" = $1 AND "b" = $2)"#);
        assert_eq!(format!("{:?}", query.params), "[1, 2]");
    }

    #[test]
    fn empty_predicate_renders_true() {
        let mut q = sql("SELECT * FROM t WHERE ");
        q.push_predicate(ValueMap::new());
        assert_eq!(q.compile().unwrap().text, "SELECT * FROM t WHERE TRUE");
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut a = sql("");
        a.push_predicate(values! { "x" => 1_i32, "y" => 2_i32 });
        let mut b = sql("");
        b.push_predicate(values! { "y" => 2_i32, "x" => 1_i32 });
        let qa = a.compile().unwrap();
        let qb = b.compile().unwrap();
        assert_eq!(qa.text, qb.text);
        assert_eq!(format!("{:?}", qa.params), format!("{:?}", qb.params));
    }

    #[test]
    fn bound_values_never_reach_the_text() {
        let hostile = r#"'; DROP TABLE users; --"#;
        let mut q = sql("SELECT * FROM t WHERE ");
        q.push_predicate(values! { "name" => hostile });
        let query = q.compile().unwrap();
        assert!(!query.text.contains("DROP TABLE"));
        assert_eq!(query.text, r#"SELECT * FROM t WHERE ("name" = $1)"#);
    }

    #[test]
    fn self_outside_column_context_errors() {
        let mut q = sql("SELECT ");
        q.push_expr(self_column());
        assert!(matches!(
            q.compile().unwrap_err(),
            SqlError::SelfWithoutColumn
        ));
    }

    #[test]
    fn self_resolves_inside_values() {
        let mut bump = SqlFragment::empty();
        bump.push_expr(self_column()).push(" + 1");

        let mut q = sql("SELECT * FROM t WHERE ");
        q.push_predicate(values! { "visits" => bump.embed() });
        // The predicate still renders `col = <value>`; the fragment supplies
        // the right-hand side.
        assert_eq!(
            q.compile().unwrap().text,
            r#"SELECT * FROM t WHERE ("visits" = "visits" + 1)"#
        );
    }

    #[test]
    fn parent_outside_lateral_errors() {
        let mut q = sql("SELECT * FROM t WHERE ");
        q.push_predicate(values! { "a_id" => parent("id") });
        assert!(matches!(
            q.compile().unwrap_err(),
            SqlError::ParentWithoutTable
        ));
    }

    #[test]
    fn parent_resolves_against_fragment_parent_table() {
        let mut q = sql("SELECT * FROM b WHERE ");
        q.push_predicate(values! { "a_id" => parent("id") });
        let q = q.with_parent_table("a");
        assert_eq!(
            q.compile().unwrap().text,
            r#"SELECT * FROM b WHERE ("a_id" = "a"."id")"#
        );
    }

    #[test]
    fn prepared_names_are_distinct() {
        let a = sql("SELECT 1").prepared();
        let b = sql("SELECT 1").prepared();
        let qa = a.compile().unwrap();
        let qb = b.compile().unwrap();
        assert!(qa.name.as_deref().unwrap().starts_with("pgshape_"));
        assert_ne!(qa.name, qb.name);
    }

    #[test]
    fn raw_text_is_spliced_verbatim() {
        let mut q = sql("SELECT ");
        q.push_expr(Sql::raw("now()"));
        assert_eq!(q.compile().unwrap().text, "SELECT now()");
    }

    #[test]
    fn cast_params_render_cast_syntax() {
        let mut q = sql("SELECT ");
        q.push_param(Param::new("5").cast("int4"));
        q.push(", ");
        q.push_param(Param::json(serde_json::json!([1, 2])));
        let query = q.compile().unwrap();
        assert_eq!(
            query.text,
            r#"SELECT CAST($1 AS "int4"), CAST($2 AS "json")"#
        );
        assert_eq!(format!("{:?}", query.params), r#"["5", "[1,2]"]"#);
    }
}
