//! Result transforms.
//!
//! Every shortcut builder fixes one of these on the fragment it emits; `run`
//! applies it to the driver's rows. The default converts each row's keys from
//! snake_case to camelCase; the shortcut-specific variants unwrap the
//! `result` column the builders alias their JSON output to.

use crate::client::JsonRow;
use crate::compile::Query;
use crate::error::{SqlError, SqlResult};
use crate::ident::camel_case;
use serde_json::Value;

/// How `run` reshapes the rows a query returns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RunTransform {
    /// Rows as JSON objects with camelCased keys (the default for
    /// hand-written fragments).
    #[default]
    Rows,
    /// The `result` column of the first row; an error if no row came back.
    /// Used where the SQL shape guarantees a row (single-row insert, the
    /// aggregated outer query of a Many-mode select).
    ResultOne,
    /// The `result` column of every row.
    ResultMany,
    /// The `result` column of the first row, or `null` when no row matched.
    ResultOptional,
    /// The `result` column of the first row; raises
    /// [`NotExactlyOne`](SqlError::NotExactlyOne) when no row matched.
    ResultExactlyOne,
    /// The `result` column of the first row parsed as a number. The driver
    /// returns `int8` aggregates as text; precision loss past 2^53 is
    /// accepted.
    Numeric,
    /// No result (`TRUNCATE`).
    None,
}

impl RunTransform {
    pub(crate) fn apply(&self, rows: Vec<JsonRow>, query: &Query) -> SqlResult<Value> {
        match self {
            RunTransform::Rows => Ok(Value::Array(
                rows.into_iter()
                    .map(|row| {
                        Value::Object(
                            row.into_iter()
                                .map(|(key, value)| (camel_case(&key), value))
                                .collect(),
                        )
                    })
                    .collect(),
            )),
            RunTransform::ResultOne => take_result(first(rows).ok_or_else(|| {
                SqlError::decode("result", "query unexpectedly returned no rows")
            })?),
            RunTransform::ResultMany => rows.into_iter().map(take_result).collect::<SqlResult<_>>().map(Value::Array),
            RunTransform::ResultOptional => match first(rows) {
                Some(row) => take_result(row),
                None => Ok(Value::Null),
            },
            RunTransform::ResultExactlyOne => match first(rows) {
                Some(row) => take_result(row),
                None => Err(SqlError::NotExactlyOne {
                    query: query.clone(),
                }),
            },
            RunTransform::Numeric => {
                let row = first(rows).ok_or_else(|| {
                    SqlError::decode("result", "aggregate query returned no rows")
                })?;
                let value = take_result(row)?;
                let parsed = match &value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.parse::<f64>().ok(),
                    _ => None,
                };
                let parsed = parsed.ok_or_else(|| {
                    SqlError::decode("result", format!("aggregate did not return a number: {value}"))
                })?;
                serde_json::Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| SqlError::decode("result", "aggregate returned a non-finite number"))
            }
            RunTransform::None => Ok(Value::Null),
        }
    }
}

fn first(rows: Vec<JsonRow>) -> Option<JsonRow> {
    rows.into_iter().next()
}

fn take_result(mut row: JsonRow) -> SqlResult<Value> {
    row.remove("result")
        .ok_or_else(|| SqlError::decode("result", "row is missing the result column"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql;
    use serde_json::json;

    fn query() -> Query {
        sql("SELECT 1").compile().unwrap()
    }

    fn row(value: Value) -> JsonRow {
        let mut row = JsonRow::new();
        row.insert("result".to_string(), value);
        row
    }

    #[test]
    fn rows_transform_camel_cases_keys() {
        let mut r = JsonRow::new();
        r.insert("user_id".to_string(), json!(1));
        r.insert("created_at".to_string(), json!("2026-01-01"));
        let out = RunTransform::Rows.apply(vec![r], &query()).unwrap();
        assert_eq!(out, json!([{ "userId": 1, "createdAt": "2026-01-01" }]));
    }

    #[test]
    fn result_many_unwraps_each_row() {
        let out = RunTransform::ResultMany
            .apply(vec![row(json!({"id": 1})), row(json!({"id": 2}))], &query())
            .unwrap();
        assert_eq!(out, json!([{ "id": 1 }, { "id": 2 }]));
    }

    #[test]
    fn result_optional_is_null_on_empty() {
        let out = RunTransform::ResultOptional.apply(vec![], &query()).unwrap();
        assert_eq!(out, Value::Null);
    }

    #[test]
    fn result_exactly_one_raises_with_query() {
        let err = RunTransform::ResultExactlyOne
            .apply(vec![], &query())
            .unwrap_err();
        match err {
            SqlError::NotExactlyOne { query } => assert_eq!(query.text, "SELECT 1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn numeric_parses_int8_text() {
        let out = RunTransform::Numeric
            .apply(vec![row(json!("42"))], &query())
            .unwrap();
        assert_eq!(out, json!(42.0));
    }
}
