//! Driver row → JSON conversion.
//!
//! The shortcut builders always select a single `jsonb` column aliased
//! `result`, so their rows convert losslessly. Hand-written fragments may
//! select anything; this module mirrors the engine's wire expectations for
//! the common scalar and array types: `int8`/aggregates come back as strings
//! (matching the driver convention the numeric transform parses), `bytea` as
//! `\x`-prefixed hex, timestamps as ISO-8601 strings, enums as their labels.
//!
//! Types with no binary decoder in this stack (`numeric`, `money`, ranges,
//! `interval`, composites) surface a decode error naming the wire type; cast
//! them to `text` or `jsonb` in SQL instead.

use crate::client::JsonRow;
use crate::error::{SqlError, SqlResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::Value;
use std::fmt::Write;
use tokio_postgres::types::{FromSql, Kind, Type};
use tokio_postgres::Row;

/// Enum values arrive as their label bytes; the driver's stock `String`
/// decoder rejects enum wire types, so this accepts anything textual.
struct EnumLabel(String);

impl<'a> FromSql<'a> for EnumLabel {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(EnumLabel(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

pub fn rows_to_json(rows: &[Row]) -> SqlResult<Vec<JsonRow>> {
    rows.iter().map(row_to_json).collect()
}

pub fn row_to_json(row: &Row) -> SqlResult<JsonRow> {
    let mut out = JsonRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), cell_to_json(row, idx)?);
    }
    Ok(out)
}

fn cell_to_json(row: &Row, idx: usize) -> SqlResult<Value> {
    let column = &row.columns()[idx];
    let name = column.name();
    let ty = column.type_();

    if let Kind::Array(inner) = ty.kind() {
        return array_to_json(row, idx, name, inner);
    }
    if let Kind::Enum(_) = ty.kind() {
        return Ok(json_or_null(get::<EnumLabel>(row, idx, name)?, |v| {
            Value::String(v.0)
        }));
    }

    match ty.name() {
        "bool" => Ok(json_or_null(get::<bool>(row, idx, name)?, Value::Bool)),
        "int2" => Ok(int_value(get::<i16>(row, idx, name)?.map(i64::from))),
        "int4" => Ok(int_value(get::<i32>(row, idx, name)?.map(i64::from))),
        "oid" => Ok(int_value(get::<u32>(row, idx, name)?.map(i64::from))),
        // int8 exceeds JSON's safe integer range: keep the driver's
        // text representation.
        "int8" => Ok(json_or_null(get::<i64>(row, idx, name)?, |v| {
            Value::String(v.to_string())
        })),
        "float4" => float_value(name, get::<f32>(row, idx, name)?.map(f64::from)),
        "float8" => float_value(name, get::<f64>(row, idx, name)?),
        "text" | "varchar" | "bpchar" | "name" | "citext" | "unknown" => {
            Ok(json_or_null(get::<String>(row, idx, name)?, Value::String))
        }
        "uuid" => Ok(json_or_null(get::<uuid::Uuid>(row, idx, name)?, |v| {
            Value::String(v.to_string())
        })),
        "json" | "jsonb" => Ok(get::<Value>(row, idx, name)?.unwrap_or(Value::Null)),
        "timestamptz" => Ok(json_or_null(get::<DateTime<Utc>>(row, idx, name)?, |v| {
            Value::String(v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        })),
        "timestamp" => Ok(json_or_null(get::<NaiveDateTime>(row, idx, name)?, |v| {
            Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        })),
        "date" => Ok(json_or_null(get::<NaiveDate>(row, idx, name)?, |v| {
            Value::String(v.format("%Y-%m-%d").to_string())
        })),
        "time" => Ok(json_or_null(get::<NaiveTime>(row, idx, name)?, |v| {
            Value::String(v.format("%H:%M:%S%.f").to_string())
        })),
        "bytea" => Ok(json_or_null(get::<Vec<u8>>(row, idx, name)?, |v| {
            Value::String(bytea_hex(&v))
        })),
        other => Err(SqlError::decode(
            name,
            format!("unsupported wire type `{other}`; cast it to text or jsonb in SQL"),
        )),
    }
}

fn array_to_json(row: &Row, idx: usize, name: &str, inner: &Type) -> SqlResult<Value> {
    if let Kind::Enum(_) = inner.kind() {
        return array_value(get::<Vec<Option<EnumLabel>>>(row, idx, name)?, |v| {
            Value::String(v.0)
        });
    }
    match inner.name() {
        "bool" => array_value(get::<Vec<Option<bool>>>(row, idx, name)?, Value::Bool),
        "int2" => array_value(get::<Vec<Option<i16>>>(row, idx, name)?, |v| {
            Value::Number(i64::from(v).into())
        }),
        "int4" => array_value(get::<Vec<Option<i32>>>(row, idx, name)?, |v| {
            Value::Number(i64::from(v).into())
        }),
        "int8" => array_value(get::<Vec<Option<i64>>>(row, idx, name)?, |v| {
            Value::String(v.to_string())
        }),
        "float8" => array_value(get::<Vec<Option<f64>>>(row, idx, name)?, |v| {
            serde_json::Number::from_f64(v)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }),
        "text" | "varchar" | "bpchar" | "name" | "citext" => {
            array_value(get::<Vec<Option<String>>>(row, idx, name)?, Value::String)
        }
        "uuid" => array_value(get::<Vec<Option<uuid::Uuid>>>(row, idx, name)?, |v| {
            Value::String(v.to_string())
        }),
        "json" | "jsonb" => array_value(get::<Vec<Option<Value>>>(row, idx, name)?, |v| v),
        other => Err(SqlError::decode(
            name,
            format!("unsupported array element type `{other}`"),
        )),
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize, name: &str) -> SqlResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| SqlError::decode(name, e.to_string()))
}

fn json_or_null<T>(value: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
    value.map(f).unwrap_or(Value::Null)
}

fn int_value(value: Option<i64>) -> Value {
    json_or_null(value, |v| Value::Number(v.into()))
}

fn float_value(name: &str, value: Option<f64>) -> SqlResult<Value> {
    match value {
        None => Ok(Value::Null),
        Some(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| SqlError::decode(name, "non-finite float cannot be represented in JSON")),
    }
}

fn array_value<T>(value: Option<Vec<Option<T>>>, f: impl Fn(T) -> Value) -> SqlResult<Value> {
    Ok(json_or_null(value, |items| {
        Value::Array(
            items
                .into_iter()
                .map(|item| item.map(&f).unwrap_or(Value::Null))
                .collect(),
        )
    }))
}

fn bytea_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
