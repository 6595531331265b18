//! The interpolation expression layer.
//!
//! Everything that can be spliced into a [`SqlFragment`](crate::SqlFragment)
//! is a variant of the closed [`Sql`] union. Identifier strings become the
//! [`Ident`](Sql::Ident) variant; data values become typed
//! [`Param`](Sql::Param)s; whole value or predicate maps compile with their
//! keys in sorted order.

use crate::fragment::SqlFragment;
use crate::param::Param;
use std::collections::BTreeMap;

/// A map from column name to expression, used for insert/update values,
/// predicate maps, and extras. `BTreeMap` gives the sorted-key iteration the
/// compiler relies on.
pub type ValueMap = BTreeMap<String, Sql>;

/// An interpolation expression.
#[derive(Clone, Debug)]
pub enum Sql {
    /// A nested fragment, recursively compiled.
    Fragment(Box<SqlFragment>),
    /// An identifier, quoted and case-folded per the identifier policy.
    Ident(String),
    /// Literal text spliced with no escaping. Explicitly unsafe: never pass
    /// caller-controlled data through this variant.
    Raw(String),
    /// A sequence of expressions concatenated with no separator.
    List(Vec<Sql>),
    /// A typed parameter: renders `$k` (optionally cast) and pushes its value
    /// onto the parameter vector.
    Param(Param),
    /// The SQL `DEFAULT` keyword.
    Default,
    /// The current column identifier; an error outside a column-bound
    /// context.
    SelfColumn,
    /// A parent-table column reference, resolved against the ambient
    /// parent-table alias inside a lateral sub-query. `None` uses the current
    /// column name.
    Parent(Option<String>),
    /// Quoted, comma-separated column names.
    ColumnNames(Vec<String>),
    /// Comma-separated values, each optionally bound to a column so that
    /// `self` references and cast context resolve.
    ColumnValues(Vec<ColumnValue>),
    /// A predicate map: `(col₁ = v₁ AND col₂ = v₂ …)` in sorted-key order;
    /// an empty map renders `TRUE`.
    Predicate(ValueMap),
}

/// One element of a [`Sql::ColumnValues`] list.
#[derive(Clone, Debug)]
pub struct ColumnValue {
    /// The column this value is bound to, if any. Sets the current-column
    /// context while the value compiles.
    pub column: Option<String>,
    pub value: Sql,
}

impl Sql {
    /// An identifier expression.
    pub fn ident(name: impl Into<String>) -> Self {
        Sql::Ident(name.into())
    }

    /// The raw-text escape hatch. No quoting, no escaping.
    pub fn raw(text: impl Into<String>) -> Self {
        Sql::Raw(text.into())
    }

    /// A plain typed parameter.
    pub fn param<T: tokio_postgres::types::ToSql + Send + Sync + 'static>(value: T) -> Self {
        Sql::Param(Param::new(value))
    }

    /// A JSON parameter: serialized up front and cast to `json` server-side.
    pub fn json(value: impl Into<serde_json::Value>) -> Self {
        Sql::Param(Param::json(value))
    }
}

/// The current column identifier, usable inside values and predicate maps:
///
/// ```ignore
/// let mut bump = SqlFragment::empty();
/// bump.push_expr(self_column()).push(" + 1");
/// update("counters", values! { "hits" => bump.embed() }, WhereSpec::All);
/// ```
pub fn self_column() -> Sql {
    Sql::SelfColumn
}

/// A reference to the named column of the parent table, valid inside a
/// lateral sub-query.
pub fn parent(column: impl Into<String>) -> Sql {
    Sql::Parent(Some(column.into()))
}

/// A reference to the parent table's column of the same name as the current
/// column.
pub fn parent_column() -> Sql {
    Sql::Parent(None)
}

impl From<SqlFragment> for Sql {
    fn from(fragment: SqlFragment) -> Self {
        Sql::Fragment(Box::new(fragment))
    }
}

impl From<Param> for Sql {
    fn from(param: Param) -> Self {
        Sql::Param(param)
    }
}

impl From<&str> for Sql {
    fn from(value: &str) -> Self {
        Sql::param(value.to_string())
    }
}

impl From<String> for Sql {
    fn from(value: String) -> Self {
        Sql::param(value)
    }
}

impl From<bool> for Sql {
    fn from(value: bool) -> Self {
        Sql::param(value)
    }
}

impl From<i16> for Sql {
    fn from(value: i16) -> Self {
        Sql::param(value)
    }
}

impl From<i32> for Sql {
    fn from(value: i32) -> Self {
        Sql::param(value)
    }
}

impl From<i64> for Sql {
    fn from(value: i64) -> Self {
        Sql::param(value)
    }
}

impl From<f32> for Sql {
    fn from(value: f32) -> Self {
        Sql::param(value)
    }
}

impl From<f64> for Sql {
    fn from(value: f64) -> Self {
        Sql::param(value)
    }
}

impl From<serde_json::Value> for Sql {
    fn from(value: serde_json::Value) -> Self {
        Sql::json(value)
    }
}

/// The where-clause selector accepted by the shortcut builders.
#[derive(Clone, Debug)]
pub enum WhereSpec {
    /// No restriction: the clause is omitted entirely.
    All,
    /// A predicate map, compiled in sorted-key order.
    Map(ValueMap),
    /// An arbitrary condition fragment.
    Fragment(SqlFragment),
}

impl From<ValueMap> for WhereSpec {
    fn from(map: ValueMap) -> Self {
        WhereSpec::Map(map)
    }
}

impl From<SqlFragment> for WhereSpec {
    fn from(fragment: SqlFragment) -> Self {
        WhereSpec::Fragment(fragment)
    }
}

/// Build a [`ValueMap`] from `key => value` pairs. Values may be anything
/// convertible to [`Sql`]: plain data, `Sql::Default`, [`parent`] references,
/// embedded fragments.
///
/// ```ignore
/// let row = values! { "email" => "x@y", "visits" => 0_i32 };
/// ```
#[macro_export]
macro_rules! values {
    () => { $crate::ValueMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::ValueMap::new();
        $( map.insert(($key).into(), $crate::Sql::from($value)); )+
        map
    }};
}
