//! SQL identifier quoting and case folding.
//!
//! Identifiers are caller-supplied strings trusted to name a table or column,
//! but not trusted to be free-form SQL. The quoting policy:
//!
//! - A string that already begins and ends with `"` passes through untouched.
//! - A string containing any uppercase ASCII letter is split on `.`, each
//!   segment snake-cased and quoted, and the segments rejoined with `.`.
//! - Anything else has `.` replaced with `"."` and the whole wrapped in `"…"`.
//!
//! Mixed-case identifiers therefore collapse to snake_case quoted form, while
//! pre-quoted and already-snake forms stay as written. Note that uppercase
//! detection scans the *whole* string: one mixed-case segment snake-cases its
//! siblings too.

use heck::{ToLowerCamelCase, ToSnakeCase};

/// Quote an identifier (table, column, or dotted path) for inclusion in SQL
/// text.
pub fn quote_ident(ident: &str) -> String {
    if ident.len() >= 2 && ident.starts_with('"') && ident.ends_with('"') {
        return ident.to_string();
    }
    if ident.bytes().any(|b| b.is_ascii_uppercase()) {
        ident
            .split('.')
            .map(|seg| format!("\"{}\"", seg.to_snake_case()))
            .collect::<Vec<_>>()
            .join(".")
    } else {
        format!("\"{}\"", ident.replace('.', "\".\""))
    }
}

/// Convert a mixed-case name to snake_case.
pub fn snake_case(name: &str) -> String {
    name.to_snake_case()
}

/// Convert a snake_case name to lowerCamelCase (used by the default row
/// transform).
pub fn camel_case(name: &str) -> String {
    name.to_lower_camel_case()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_simple() {
        assert_eq!(quote_ident("users"), r#""users""#);
    }

    #[test]
    fn quotes_dotted() {
        assert_eq!(quote_ident("public.users"), r#""public"."users""#);
    }

    #[test]
    fn passes_through_prequoted() {
        assert_eq!(quote_ident(r#""CamelCase""#), r#""CamelCase""#);
        assert_eq!(quote_ident(r#""a"."b""#), r#""a"."b""#);
    }

    #[test]
    fn folds_mixed_case_to_snake() {
        assert_eq!(quote_ident("userTable"), r#""user_table""#);
        assert_eq!(quote_ident("aId"), r#""a_id""#);
    }

    #[test]
    fn uppercase_anywhere_folds_every_segment() {
        // Detection scans the whole string, so the lowercase segment is
        // snake-cased (a no-op) along with the mixed-case one.
        assert_eq!(quote_ident("public.userTable"), r#""public"."user_table""#);
        assert_eq!(quote_ident("userTable.id"), r#""user_table"."id""#);
    }

    #[test]
    fn camel_case_round_trip() {
        assert_eq!(camel_case("user_id"), "userId");
        assert_eq!(snake_case("userId"), "user_id");
    }
}
