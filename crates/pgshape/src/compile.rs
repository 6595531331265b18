//! Fragment compilation.
//!
//! A recursive walk over a fragment tree that appends to one output string
//! and one parameter vector, threading the ambient parent-table alias and
//! current-column name. Placeholders are allocated 1-based, left to right,
//! so the k-th `$k` in the text always names the k-th value in the vector.

use crate::error::{SqlError, SqlResult};
use crate::expr::Sql;
use crate::fragment::{Part, SqlFragment};
use crate::ident::quote_ident;
use crate::param::{Cast, Param, ParamList};
use std::fmt::Write;

/// A compiled query: parameterized text, positional parameter vector, and
/// optional prepared-statement name.
#[derive(Clone, Debug)]
pub struct Query {
    pub text: String,
    pub params: ParamList,
    pub name: Option<String>,
}

#[derive(Clone, Copy)]
struct Ctx<'a> {
    parent_table: Option<&'a str>,
    column: Option<&'a str>,
}

pub(crate) fn compile_fragment(fragment: &SqlFragment) -> SqlResult<Query> {
    let mut text = String::new();
    let mut params = ParamList::new();
    render_fragment(
        fragment,
        Ctx {
            parent_table: None,
            column: None,
        },
        &mut text,
        &mut params,
    )?;
    Ok(Query {
        text,
        params,
        name: fragment.prepared_name.clone(),
    })
}

fn render_fragment(
    fragment: &SqlFragment,
    ctx: Ctx<'_>,
    out: &mut String,
    params: &mut ParamList,
) -> SqlResult<()> {
    // A fragment spliced as a lateral sub-query carries its own parent-table
    // alias, shadowing whatever is in scope outside it.
    let ctx = Ctx {
        parent_table: fragment.parent_table.as_deref().or(ctx.parent_table),
        column: ctx.column,
    };
    for part in &fragment.parts {
        match part {
            Part::Literal(text_part) => out.push_str(text_part),
            Part::Expr(expr) => render_expr(expr, ctx, out, params)?,
        }
    }
    Ok(())
}

fn render_expr(expr: &Sql, ctx: Ctx<'_>, out: &mut String, params: &mut ParamList) -> SqlResult<()> {
    match expr {
        Sql::Fragment(fragment) => render_fragment(fragment, ctx, out, params)?,
        Sql::Ident(name) => out.push_str(&quote_ident(name)),
        Sql::Raw(text) => out.push_str(text),
        Sql::List(items) => {
            for item in items {
                render_expr(item, ctx, out, params)?;
            }
        }
        Sql::Param(param) => render_param(param, out, params),
        Sql::Default => out.push_str("DEFAULT"),
        Sql::SelfColumn => {
            let column = ctx.column.ok_or(SqlError::SelfWithoutColumn)?;
            out.push_str(&quote_ident(column));
        }
        Sql::Parent(column) => {
            let parent_table = ctx.parent_table.ok_or(SqlError::ParentWithoutTable)?;
            let column = column
                .as_deref()
                .or(ctx.column)
                .ok_or(SqlError::SelfWithoutColumn)?;
            out.push_str(&quote_ident(parent_table));
            out.push('.');
            out.push_str(&quote_ident(column));
        }
        Sql::ColumnNames(columns) => {
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&quote_ident(column));
            }
        }
        Sql::ColumnValues(values) => {
            for (i, column_value) in values.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let ctx = Ctx {
                    parent_table: ctx.parent_table,
                    column: column_value.column.as_deref().or(ctx.column),
                };
                render_expr(&column_value.value, ctx, out, params)?;
            }
        }
        Sql::Predicate(map) => {
            if map.is_empty() {
                out.push_str("TRUE");
                return Ok(());
            }
            out.push('(');
            for (i, (column, value)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(" AND ");
                }
                out.push_str(&quote_ident(column));
                out.push_str(" = ");
                let ctx = Ctx {
                    parent_table: ctx.parent_table,
                    column: Some(column),
                };
                render_expr(value, ctx, out, params)?;
            }
            out.push(')');
        }
    }
    Ok(())
}

fn render_param(param: &Param, out: &mut String, params: &mut ParamList) {
    let idx = params.push(param.clone());
    match param.cast_directive() {
        Cast::None => {
            let _ = write!(out, "${idx}");
        }
        Cast::Type(typename) => {
            let _ = write!(out, "CAST(${idx} AS \"{typename}\")");
        }
        Cast::Json => {
            let _ = write!(out, "CAST(${idx} AS \"json\")");
        }
    }
}
