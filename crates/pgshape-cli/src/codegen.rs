//! Rust code emission.
//!
//! One module per schema: enum declarations (with an ordered label tuple per
//! enum), then one module per table carrying identifier constants and the
//! four per-table shapes (`Selectable`, `Insertable`, `Updatable`,
//! `Whereable`).

use crate::introspect::{ColumnDef, EnumDef, SchemaDef, TableDef};
use crate::type_mapper::TypeMapper;
use heck::{ToPascalCase, ToShoutySnakeCase, ToSnakeCase};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

pub fn generate_schema(schema: &SchemaDef, mapper: &TypeMapper) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// @generated by pgshape-cli. Do not edit.");
    let _ = writeln!(out, "// schema: {}", schema.name);
    let _ = writeln!(out);

    if schema.tables.is_empty() && schema.enums.is_empty() {
        return out;
    }

    let _ = writeln!(out, "#![allow(unused_imports)]");
    let _ = writeln!(out);
    let _ = writeln!(out, "use serde::{{Deserialize, Serialize}};");

    for enum_def in &schema.enums {
        let _ = writeln!(out);
        emit_enum(&mut out, enum_def);
    }

    for table in &schema.tables {
        let _ = writeln!(out);
        emit_table(&mut out, table, mapper);
    }

    out
}

fn emit_enum(out: &mut String, enum_def: &EnumDef) {
    let type_name = enum_def.name.to_pascal_case();

    let _ = writeln!(out, "/// The `{}` enum.", enum_def.name);
    let _ = writeln!(
        out,
        "#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]"
    );
    let _ = writeln!(out, "pub enum {type_name} {{");
    for label in &enum_def.labels {
        let _ = writeln!(out, "    #[serde(rename = \"{}\")]", escape(label));
        let _ = writeln!(out, "    {},", variant_ident(label));
    }
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);

    let _ = writeln!(out, "/// Labels of `{}` in catalog order.", enum_def.name);
    let _ = writeln!(
        out,
        "pub const {}_LABELS: [&str; {}] = [{}];",
        enum_def.name.to_shouty_snake_case(),
        enum_def.labels.len(),
        enum_def
            .labels
            .iter()
            .map(|l| format!("\"{}\"", escape(l)))
            .collect::<Vec<_>>()
            .join(", ")
    );
}

fn emit_table(out: &mut String, table: &TableDef, mapper: &TypeMapper) {
    let module = module_ident(&table.name);

    let _ = writeln!(out, "pub mod {module} {{");
    let _ = writeln!(out, "    use super::*;");
    let _ = writeln!(out);
    let _ = writeln!(out, "    pub const TABLE: &str = \"{}\";", escape(&table.name));
    let _ = writeln!(
        out,
        "    pub const COLUMNS: [&str; {}] = [{}];",
        table.columns.len(),
        table
            .columns
            .iter()
            .map(|c| format!("\"{}\"", escape(&c.name)))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let _ = writeln!(
        out,
        "    pub const UNIQUE_INDEXES: [&str; {}] = [{}];",
        table.unique_indexes.len(),
        table
            .unique_indexes
            .iter()
            .map(|i| format!("\"{}\"", escape(i)))
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Selectable: Option only for nullable columns. Insertable: Option also
    // for defaulted columns (omit to take the default). Updatable/Whereable:
    // everything optional.
    emit_struct(out, "Selectable", &table.columns, mapper, |c| c.is_nullable);
    emit_struct(out, "Insertable", &table.columns, mapper, |c| {
        c.is_nullable || c.has_default
    });
    emit_struct(out, "Updatable", &table.columns, mapper, |_| true);
    emit_struct(out, "Whereable", &table.columns, mapper, |_| true);

    let _ = writeln!(out, "}}");
}

fn emit_struct(
    out: &mut String,
    name: &str,
    columns: &[ColumnDef],
    mapper: &TypeMapper,
    optional: impl Fn(&ColumnDef) -> bool,
) {
    let _ = writeln!(out);
    let _ = writeln!(out, "    #[derive(Clone, Debug, Serialize, Deserialize)]");
    let _ = writeln!(out, "    pub struct {name} {{");
    for column in columns {
        let field = field_ident(&column.name);
        if field_name_differs(&field, &column.name) {
            let _ = writeln!(out, "        #[serde(rename = \"{}\")]", escape(&column.name));
        }
        let mut ty = mapper.map(&column.sql_type);
        if optional(column) {
            ty = format!("Option<{ty}>");
        }
        let _ = writeln!(out, "        pub {field}: {ty},");
    }
    let _ = writeln!(out, "    }}");
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn variant_ident(label: &str) -> String {
    let pascal = label.to_pascal_case();
    if pascal.is_empty() || pascal.chars().next().unwrap().is_ascii_digit() {
        format!("V{pascal}")
    } else {
        pascal
    }
}

fn module_ident(table: &str) -> String {
    sanitize_snake(table)
}

fn field_ident(column: &str) -> String {
    let snake = sanitize_snake(column);
    match snake.as_str() {
        // Raw identifiers cover most keywords; the path keywords cannot be
        // raw at all.
        "self" | "super" | "crate" | "extern" => format!("{snake}_"),
        "type" | "ref" | "use" | "mod" | "move" | "fn" | "struct" | "enum" | "impl" | "trait"
        | "where" | "for" | "in" | "loop" | "match" | "if" | "else" | "let" | "const"
        | "static" | "pub" | "as" | "box" | "break" | "continue" | "do" | "dyn" | "false"
        | "true" | "return" | "unsafe" | "while" | "yield" | "async" | "await" => {
            format!("r#{snake}")
        }
        _ => snake,
    }
}

fn field_name_differs(field: &str, column: &str) -> bool {
    field.strip_prefix("r#").unwrap_or(field) != column
}

fn sanitize_snake(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let snake = cleaned.to_snake_case();
    if snake.is_empty() {
        "_".to_string()
    } else if snake.chars().next().unwrap().is_ascii_digit() {
        format!("_{snake}")
    } else {
        snake
    }
}
