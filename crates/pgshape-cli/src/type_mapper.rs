//! SQL type → Rust type mapping.
//!
//! One fixed table shared by every emitted shape; the runtime's wire
//! conversion mirrors it. `numeric` and `money` map to `String` (no binary
//! decoder in the stack, and text round-trips without precision loss); the
//! mapper warns once per run the first time such a column is seen.

use crate::introspect::EnumDef;
use heck::ToPascalCase;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct TypeMapper {
    /// User overrides from `[types]` (normalized PG type -> Rust path/type).
    custom: BTreeMap<String, String>,
    /// Enum type names in the current schema.
    enums: BTreeSet<String>,
    text_numeric_warned: AtomicBool,
}

impl TypeMapper {
    pub fn new(custom: BTreeMap<String, String>, enums: &[EnumDef]) -> Self {
        let mut normalized = BTreeMap::new();
        for (k, v) in custom {
            normalized.insert(normalize_pg_type(&k), v);
        }
        Self {
            custom: normalized,
            enums: enums.iter().map(|e| e.name.clone()).collect(),
            text_numeric_warned: AtomicBool::new(false),
        }
    }

    pub fn map(&self, pg_type: &str) -> String {
        let normalized = normalize_pg_type(pg_type);

        if let Some(t) = self.custom.get(&normalized) {
            return t.clone();
        }

        // Arrays from `format_type` look like `integer[]`, `uuid[]`, etc.
        if let Some(base) = normalized.strip_suffix("[]") {
            let inner = self.map(base);
            return format!("Vec<{inner}>");
        }

        if self.enums.contains(&normalized) {
            return normalized.to_pascal_case();
        }

        match normalized.as_str() {
            "bool" | "boolean" => "bool".to_string(),

            "int2" | "smallint" => "i16".to_string(),
            "int4" | "integer" | "serial" => "i32".to_string(),
            "int8" | "bigint" | "bigserial" => "i64".to_string(),
            "oid" => "u32".to_string(),

            "float4" | "real" => "f32".to_string(),
            "float8" | "double precision" => "f64".to_string(),

            "numeric" | "decimal" | "money" => {
                self.warn_text_numeric(&normalized);
                "String".to_string()
            }

            "text" | "varchar" | "char" | "character" | "citext" | "name" | "interval"
            | "inet" | "timetz" | "time with time zone" => "String".to_string(),

            "int4range" | "int8range" | "numrange" | "tsrange" | "tstzrange" | "daterange" => {
                "String".to_string()
            }

            "uuid" => "uuid::Uuid".to_string(),
            "json" | "jsonb" => "serde_json::Value".to_string(),

            "timestamptz" => "chrono::DateTime<chrono::Utc>".to_string(),
            "timestamp" | "timestamp without time zone" => "chrono::NaiveDateTime".to_string(),
            "date" => "chrono::NaiveDate".to_string(),
            "time" | "time without time zone" => "chrono::NaiveTime".to_string(),

            "bytea" => "Vec<u8>".to_string(),

            // Conservative default (compiles; user can cast/override for
            // runtime correctness).
            _ => "String".to_string(),
        }
    }

    fn warn_text_numeric(&self, pg_type: &str) {
        if !self.text_numeric_warned.swap(true, Ordering::Relaxed) {
            eprintln!(
                "note: `{pg_type}` columns map to String (text representation); \
                 add a [types] override to use a decimal crate"
            );
        }
    }
}

pub fn normalize_pg_type(pg_type: &str) -> String {
    // Lowercase, remove `(…)` typmods, compress spaces.
    let mut s = pg_type.trim().to_lowercase();

    // Remove typmods: `varchar(255)`, `timestamp(3) with time zone`, `numeric(10,2)`, ...
    while let Some(start) = s.find('(') {
        let Some(end) = s[start..].find(')') else {
            break;
        };
        s.replace_range(start..start + end + 1, "");
    }

    let s = s
        .split_whitespace()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    // Normalize common synonyms.
    match s.as_str() {
        "character varying" => "varchar".to_string(),
        "timestamp with time zone" => "timestamptz".to_string(),
        _ => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> TypeMapper {
        TypeMapper::new(BTreeMap::new(), &[])
    }

    #[test]
    fn normalize_pg_type_strips_typmods() {
        assert_eq!(normalize_pg_type("character varying(255)"), "varchar");
        assert_eq!(
            normalize_pg_type("timestamp(3) with time zone"),
            "timestamptz"
        );
    }

    #[test]
    fn map_builtin_types() {
        let m = mapper();
        assert_eq!(m.map("integer"), "i32");
        assert_eq!(m.map("bigint"), "i64");
        assert_eq!(m.map("uuid"), "uuid::Uuid");
        assert_eq!(m.map("uuid[]"), "Vec<uuid::Uuid>");
        assert_eq!(m.map("jsonb"), "serde_json::Value");
        assert_eq!(m.map("numeric(10,2)"), "String");
        assert_eq!(m.map("tstzrange"), "String");
        assert_eq!(m.map("bytea"), "Vec<u8>");
    }

    #[test]
    fn enum_types_map_to_pascal_case() {
        let enums = vec![EnumDef {
            name: "order_status".to_string(),
            labels: vec!["open".to_string()],
        }];
        let m = TypeMapper::new(BTreeMap::new(), &enums);
        assert_eq!(m.map("order_status"), "OrderStatus");
        assert_eq!(m.map("order_status[]"), "Vec<OrderStatus>");
    }

    #[test]
    fn custom_mapping_overrides_builtin() {
        let mut custom = BTreeMap::new();
        custom.insert("numeric".to_string(), "rust_decimal::Decimal".to_string());
        let m = TypeMapper::new(custom, &[]);
        assert_eq!(m.map("numeric(10,2)"), "rust_decimal::Decimal");
    }
}
