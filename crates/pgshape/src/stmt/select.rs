//! SELECT builder and the lateral JSON aggregation model.
//!
//! Each row is shaped into a single `jsonb` value aliased `result`:
//! `to_jsonb(alias.*)` (or `jsonb_build_object(…)` for a restricted column
//! list), `||`-merged with extras and with the results of lateral
//! sub-queries. Many-mode wraps the inner query in
//! `coalesce(jsonb_agg(result), '[]')` so ordering and pagination apply to
//! the tuple stream before aggregation, and the whole tree comes back in one
//! round-trip.

use super::{push_extras, push_row_selector, push_where};
use crate::client::Queryable;
use crate::error::SqlResult;
use crate::expr::{Sql, ValueMap, WhereSpec};
use crate::fragment::{sql, SqlFragment};
use crate::transform::RunTransform;
use serde_json::Value;
use std::collections::BTreeMap;

/// Select rows as a JSON array (Many mode).
pub fn select(table: &str, where_: impl Into<WhereSpec>) -> Select {
    Select::new(table, where_.into(), SelectMode::Many)
}

/// Select at most one row (`LIMIT 1`); the result is the row's JSON or
/// `null`.
pub fn select_one(table: &str, where_: impl Into<WhereSpec>) -> Select {
    Select::new(table, where_.into(), SelectMode::One)
}

/// Select exactly one row; running the fragment raises
/// [`NotExactlyOne`](crate::SqlError::NotExactlyOne) when nothing matches.
pub fn select_exactly_one(table: &str, where_: impl Into<WhereSpec>) -> Select {
    Select::new(table, where_.into(), SelectMode::ExactlyOne)
}

/// `count(*)` (or `count("col")` after [`Select::columns`]) over the
/// matching rows.
pub fn count(table: &str, where_: impl Into<WhereSpec>) -> Select {
    Select::new(table, where_.into(), SelectMode::Numeric("count"))
}

/// `sum("column")` over the matching rows.
pub fn sum(table: &str, where_: impl Into<WhereSpec>, column: &str) -> Select {
    aggregate(table, where_.into(), "sum", column)
}

/// `avg("column")` over the matching rows.
pub fn avg(table: &str, where_: impl Into<WhereSpec>, column: &str) -> Select {
    aggregate(table, where_.into(), "avg", column)
}

/// `min("column")` over the matching rows.
pub fn min(table: &str, where_: impl Into<WhereSpec>, column: &str) -> Select {
    aggregate(table, where_.into(), "min", column)
}

/// `max("column")` over the matching rows.
pub fn max(table: &str, where_: impl Into<WhereSpec>, column: &str) -> Select {
    aggregate(table, where_.into(), "max", column)
}

fn aggregate(table: &str, where_: WhereSpec, function: &'static str, column: &str) -> Select {
    Select::new(table, where_, SelectMode::Numeric(function)).columns(&[column])
}

/// Result mode of a select.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectMode {
    /// All matching rows, aggregated server-side into one JSON array.
    Many,
    /// At most one row.
    One,
    /// Exactly one row, or an error.
    ExactlyOne,
    /// A single aggregate value.
    Numeric(&'static str),
}

/// `DISTINCT` forms.
#[derive(Clone, Debug)]
pub enum Distinct {
    /// Plain `DISTINCT`.
    Rows,
    /// `DISTINCT ON (col, …)`.
    On(Vec<String>),
    /// `DISTINCT ON (<expression>)`.
    OnFragment(SqlFragment),
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Null placement in an ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderNulls {
    First,
    Last,
}

/// One `ORDER BY` term.
#[derive(Clone, Debug)]
pub struct OrderSpec {
    by: Sql,
    direction: OrderDirection,
    nulls: Option<OrderNulls>,
}

impl OrderSpec {
    /// Order ascending by a column.
    pub fn asc(column: &str) -> Self {
        Self {
            by: Sql::Ident(column.to_string()),
            direction: OrderDirection::Asc,
            nulls: None,
        }
    }

    /// Order descending by a column.
    pub fn desc(column: &str) -> Self {
        Self {
            by: Sql::Ident(column.to_string()),
            direction: OrderDirection::Desc,
            nulls: None,
        }
    }

    /// Order by an arbitrary expression.
    pub fn fragment(by: SqlFragment, direction: OrderDirection) -> Self {
        Self {
            by: by.embed(),
            direction,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(OrderNulls::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(OrderNulls::Last);
        self
    }
}

/// Row locking clause.
#[derive(Clone, Debug)]
pub struct Lock {
    strength: LockStrength,
    of: Vec<String>,
    wait: Option<LockWait>,
}

/// `FOR …` lock strengths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockStrength {
    Update,
    NoKeyUpdate,
    Share,
    KeyShare,
}

/// Lock wait policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockWait {
    NoWait,
    SkipLocked,
}

impl Lock {
    pub fn for_update() -> Self {
        Self::new(LockStrength::Update)
    }

    pub fn for_no_key_update() -> Self {
        Self::new(LockStrength::NoKeyUpdate)
    }

    pub fn for_share() -> Self {
        Self::new(LockStrength::Share)
    }

    pub fn for_key_share() -> Self {
        Self::new(LockStrength::KeyShare)
    }

    fn new(strength: LockStrength) -> Self {
        Self {
            strength,
            of: Vec::new(),
            wait: None,
        }
    }

    /// Restrict the lock to these tables.
    pub fn of(mut self, tables: &[&str]) -> Self {
        self.of = tables.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn no_wait(mut self) -> Self {
        self.wait = Some(LockWait::NoWait);
        self
    }

    pub fn skip_locked(mut self) -> Self {
        self.wait = Some(LockWait::SkipLocked);
        self
    }
}

#[derive(Clone, Debug)]
enum Lateral {
    /// Named sub-queries, each merged into the row JSON under its key.
    Map(BTreeMap<String, SqlFragment>),
    /// A single sub-query whose result replaces the row shape entirely.
    Passthru(SqlFragment),
}

/// SELECT statement builder.
#[derive(Clone, Debug)]
pub struct Select {
    table: String,
    where_: WhereSpec,
    mode: SelectMode,
    distinct: Option<Distinct>,
    columns: Option<Vec<String>>,
    extras: ValueMap,
    order: Vec<OrderSpec>,
    group_by: Vec<Sql>,
    having: Option<WhereSpec>,
    limit: Option<i64>,
    offset: Option<i64>,
    with_ties: bool,
    alias: Option<String>,
    locks: Vec<Lock>,
    lateral: Option<Lateral>,
}

impl Select {
    fn new(table: &str, where_: WhereSpec, mode: SelectMode) -> Self {
        Self {
            table: table.to_string(),
            where_,
            mode,
            distinct: None,
            columns: None,
            extras: ValueMap::new(),
            order: Vec::new(),
            group_by: Vec::new(),
            having: None,
            limit: None,
            offset: None,
            with_ties: false,
            alias: None,
            locks: Vec::new(),
            lateral: None,
        }
    }

    /// Plain `DISTINCT`.
    pub fn distinct(mut self) -> Self {
        self.distinct = Some(Distinct::Rows);
        self
    }

    /// `DISTINCT ON (col, …)`.
    pub fn distinct_on(mut self, columns: &[&str]) -> Self {
        self.distinct = Some(Distinct::On(columns.iter().map(|c| c.to_string()).collect()));
        self
    }

    /// `DISTINCT ON (<expression>)`.
    pub fn distinct_on_fragment(mut self, expression: SqlFragment) -> Self {
        self.distinct = Some(Distinct::OnFragment(expression));
        self
    }

    /// Restrict the JSON object produced per row to these columns.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Merge extra `{name: expression}` pairs into each row's JSON object.
    pub fn extras(mut self, extras: ValueMap) -> Self {
        self.extras = extras;
        self
    }

    /// Append an `ORDER BY` term.
    pub fn order(mut self, spec: OrderSpec) -> Self {
        self.order.push(spec);
        self
    }

    /// `GROUP BY` these columns.
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by
            .extend(columns.iter().map(|c| Sql::Ident(c.to_string())));
        self
    }

    /// `GROUP BY` an arbitrary expression.
    pub fn group_by_fragment(mut self, expression: SqlFragment) -> Self {
        self.group_by.push(expression.embed());
        self
    }

    /// `HAVING` a predicate map or fragment.
    pub fn having(mut self, having: impl Into<WhereSpec>) -> Self {
        self.having = Some(having.into());
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Render the limit as `FETCH FIRST n ROWS WITH TIES` (requires an
    /// ordering).
    pub fn with_ties(mut self) -> Self {
        self.with_ties = true;
        self
    }

    /// Alias the table. Mandatory for self-joins via lateral.
    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Append a row-locking clause.
    pub fn lock(mut self, lock: Lock) -> Self {
        self.locks.push(lock);
        self
    }

    /// Attach a named lateral sub-query; its result is merged into each row's
    /// JSON under `name`.
    pub fn lateral(mut self, name: &str, subquery: impl Into<SqlFragment>) -> Self {
        let mut map = match self.lateral.take() {
            Some(Lateral::Map(map)) => map,
            _ => BTreeMap::new(),
        };
        map.insert(name.to_string(), subquery.into());
        self.lateral = Some(Lateral::Map(map));
        self
    }

    /// Attach a single lateral sub-query whose result replaces the row's
    /// shape entirely.
    pub fn lateral_passthru(mut self, subquery: impl Into<SqlFragment>) -> Self {
        self.lateral = Some(Lateral::Passthru(subquery.into()));
        self
    }

    /// Emit the fragment.
    pub fn fragment(self) -> SqlFragment {
        let alias = self.alias.clone().unwrap_or_else(|| self.table.clone());
        if let SelectMode::Numeric(function) = self.mode {
            return self.numeric_fragment(function, &alias);
        }

        let mut inner = sql("SELECT ");
        match &self.distinct {
            None => {}
            Some(Distinct::Rows) => {
                inner.push("DISTINCT ");
            }
            Some(Distinct::On(columns)) => {
                inner
                    .push("DISTINCT ON (")
                    .push_expr(Sql::ColumnNames(columns.clone()))
                    .push(") ");
            }
            Some(Distinct::OnFragment(expression)) => {
                inner
                    .push("DISTINCT ON (")
                    .push_fragment(expression.clone())
                    .push(") ");
            }
        }

        match &self.lateral {
            Some(Lateral::Passthru(_)) => {
                inner.push_ident("lateral_passthru").push(".result");
            }
            _ => {
                push_row_selector(&mut inner, &alias, &self.columns);
                push_extras(&mut inner, &self.extras);
                if let Some(Lateral::Map(subqueries)) = &self.lateral {
                    if !subqueries.is_empty() {
                        inner.push(" || jsonb_build_object(");
                        for (i, key) in subqueries.keys().enumerate() {
                            if i > 0 {
                                inner.push(", ");
                            }
                            inner.push("'");
                            inner.push(&key.replace('\'', "''"));
                            inner.push("', ");
                            inner.push_ident(&format!("lateral_{key}"));
                            inner.push(".result");
                        }
                        inner.push(")");
                    }
                }
            }
        }

        inner.push(" AS result FROM ").push_ident(&self.table);
        if alias != self.table {
            inner.push(" AS ").push_ident(&alias);
        }

        match &self.lateral {
            Some(Lateral::Map(subqueries)) => {
                for (key, subquery) in subqueries {
                    push_lateral_join(&mut inner, key, subquery, &alias);
                }
            }
            Some(Lateral::Passthru(subquery)) => {
                push_lateral_join(&mut inner, "passthru", subquery, &alias);
            }
            None => {}
        }

        push_where(&mut inner, self.where_.clone());

        if !self.group_by.is_empty() {
            inner.push(" GROUP BY ");
            for (i, term) in self.group_by.iter().enumerate() {
                if i > 0 {
                    inner.push(", ");
                }
                inner.push_expr(term.clone());
            }
        }
        match &self.having {
            None | Some(WhereSpec::All) => {}
            Some(WhereSpec::Map(map)) => {
                inner.push(" HAVING ").push_predicate(map.clone());
            }
            Some(WhereSpec::Fragment(condition)) => {
                inner.push(" HAVING ").push_fragment(condition.clone());
            }
        }

        if !self.order.is_empty() {
            inner.push(" ORDER BY ");
            for (i, spec) in self.order.iter().enumerate() {
                if i > 0 {
                    inner.push(", ");
                }
                inner.push_expr(spec.by.clone());
                inner.push(match spec.direction {
                    OrderDirection::Asc => " ASC",
                    OrderDirection::Desc => " DESC",
                });
                match spec.nulls {
                    None => {}
                    Some(OrderNulls::First) => {
                        inner.push(" NULLS FIRST");
                    }
                    Some(OrderNulls::Last) => {
                        inner.push(" NULLS LAST");
                    }
                }
            }
        }

        let limit = match self.mode {
            SelectMode::One | SelectMode::ExactlyOne => Some(1),
            _ => self.limit,
        };
        if self.with_ties {
            if let Some(n) = self.offset {
                inner.push(" OFFSET ").push_bind(n).push(" ROWS");
            }
            if let Some(n) = limit {
                inner
                    .push(" FETCH FIRST ")
                    .push_bind(n)
                    .push(" ROWS WITH TIES");
            }
        } else {
            if let Some(n) = limit {
                inner.push(" LIMIT ").push_bind(n);
            }
            if let Some(n) = self.offset {
                inner.push(" OFFSET ").push_bind(n);
            }
        }

        for lock in &self.locks {
            inner.push(match lock.strength {
                LockStrength::Update => " FOR UPDATE",
                LockStrength::NoKeyUpdate => " FOR NO KEY UPDATE",
                LockStrength::Share => " FOR SHARE",
                LockStrength::KeyShare => " FOR KEY SHARE",
            });
            if !lock.of.is_empty() {
                inner.push(" OF ");
                for (i, table) in lock.of.iter().enumerate() {
                    if i > 0 {
                        inner.push(", ");
                    }
                    inner.push_ident(table);
                }
            }
            match lock.wait {
                None => {}
                Some(LockWait::NoWait) => {
                    inner.push(" NOWAIT");
                }
                Some(LockWait::SkipLocked) => {
                    inner.push(" SKIP LOCKED");
                }
            }
        }

        match self.mode {
            SelectMode::Many => {
                // The outer wrap keeps ORDER BY / LIMIT / OFFSET applied to
                // the tuple stream before aggregation into one JSON array.
                let mut outer = sql("SELECT coalesce(jsonb_agg(result), '[]') AS result FROM (");
                outer
                    .push_fragment(inner)
                    .push(") AS ")
                    .push_ident(&format!("sq_{alias}"));
                outer.set_transform(RunTransform::ResultOne);
                outer
            }
            SelectMode::One => {
                inner.set_transform(RunTransform::ResultOptional);
                inner
            }
            SelectMode::ExactlyOne => {
                inner.set_transform(RunTransform::ResultExactlyOne);
                inner
            }
            SelectMode::Numeric(_) => unreachable!("handled above"),
        }
    }

    fn numeric_fragment(self, function: &str, alias: &str) -> SqlFragment {
        let mut fragment = sql("SELECT ");
        fragment.push(function).push("(");
        if matches!(self.distinct, Some(Distinct::Rows)) {
            fragment.push("DISTINCT ");
        }
        match &self.columns {
            Some(columns) if !columns.is_empty() => {
                fragment.push_expr(Sql::ColumnNames(columns.clone()));
            }
            _ => {
                fragment.push("*");
            }
        }
        fragment.push(") AS result FROM ").push_ident(&self.table);
        if alias != self.table {
            fragment.push(" AS ").push_ident(alias);
        }
        push_where(&mut fragment, self.where_);
        fragment.set_transform(RunTransform::Numeric);
        fragment
    }

    /// Emit, compile, execute, and reshape in one call.
    pub async fn run<C: Queryable>(self, conn: &C) -> SqlResult<Value> {
        self.fragment().run(conn).await
    }
}

impl From<Select> for SqlFragment {
    fn from(select: Select) -> Self {
        select.fragment()
    }
}

fn push_lateral_join(inner: &mut SqlFragment, key: &str, subquery: &SqlFragment, alias: &str) {
    inner
        .push(" LEFT JOIN LATERAL (")
        .push_fragment(subquery.with_parent_table(alias))
        .push(") AS ")
        .push_ident(&format!("lateral_{key}"))
        .push(" ON true");
}
