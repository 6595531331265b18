//! Typed parameter storage.
//!
//! Every value destined to cross the wire as data (not SQL) becomes a
//! [`Param`]: an Arc'd `ToSql` value plus a [`Cast`] directive controlling how
//! its placeholder renders. Arc storage keeps fragments clone-friendly.

use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// How a parameter's placeholder is rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cast {
    /// Plain `$k`.
    None,
    /// `CAST($k AS "typename")`; the value is pushed unchanged.
    Type(String),
    /// `CAST($k AS "json")`; the value was JSON-serialized at construction.
    Json,
}

/// A typed query parameter.
#[derive(Clone)]
pub struct Param {
    value: Arc<dyn ToSql + Send + Sync>,
    cast: Cast,
}

impl Param {
    /// Wrap any `ToSql` value as a plain parameter.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            cast: Cast::None,
        }
    }

    /// Wrap a JSON value. The value is serialized up front and the
    /// placeholder renders as `CAST($k AS "json")`, so composite values
    /// always reach the server as `json` regardless of driver type mapping.
    pub fn json(value: impl Into<serde_json::Value>) -> Self {
        Self {
            value: Arc::new(value.into().to_string()),
            cast: Cast::Json,
        }
    }

    /// Add an explicit SQL type cast: the placeholder renders as
    /// `CAST($k AS "typename")`.
    pub fn cast(mut self, typename: impl Into<String>) -> Self {
        self.cast = Cast::Type(typename.into());
        self
    }

    pub(crate) fn cast_directive(&self) -> &Cast {
        &self.cast
    }

    /// Project the inner value as a `tokio-postgres` parameter reference.
    pub fn as_ref(&self) -> &(dyn ToSql + Sync) {
        &*self.value as &(dyn ToSql + Sync)
    }
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

/// The positional parameter vector of a compiled query.
#[derive(Clone, Default)]
pub struct ParamList {
    params: Vec<Param>,
}

impl ParamList {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter and return its 1-based placeholder index.
    pub fn push(&mut self, param: Param) -> usize {
        self.params.push(param);
        self.params.len()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// All parameters as references for `tokio-postgres`.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

impl std::fmt::Debug for ParamList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.params.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_list_debug_shows_values() {
        let mut params = ParamList::new();
        params.push(Param::new("x@y"));
        params.push(Param::new(42_i64));
        assert_eq!(format!("{params:?}"), r#"["x@y", 42]"#);
    }

    #[test]
    fn json_param_serializes_up_front() {
        let p = Param::json(serde_json::json!({"b": 2, "a": 1}));
        assert_eq!(p.cast_directive(), &Cast::Json);
        assert_eq!(format!("{p:?}"), r#""{\"a\":1,\"b\":2}""#);
    }
}
