//! Placeholder translation and statement rendering.
//!
//! Queries are written with the generic `?` positional placeholder. The
//! psycopg-style backend expects `%s` instead, so statements are rewritten
//! when the executor is configured for it. Every other engine receives the
//! query text untouched.

use std::borrow::Cow;

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};

/// Engine name whose driver uses `%s` positional placeholders.
///
/// Only the rewrite is provided. The pool in this crate is SQLite, which
/// rejects `%s`, so an executor over [`crate::create_pool`] must not be
/// configured with this engine.
pub const PYFORMAT_ENGINE: &str = "postgresql_psycopg2";

/// Engine name of the bundled SQLite backend.
pub const SQLITE_ENGINE: &str = "sqlite3";

/// Rewrites `?` placeholders to `%s` when `engine` is [`PYFORMAT_ENGINE`].
///
/// Question marks inside single-quoted string literals are left alone. For
/// any other engine the input is returned borrowed and unchanged.
pub fn rewrite_placeholders<'q>(query: &'q str, engine: &str) -> Cow<'q, str> {
    if engine != PYFORMAT_ENGINE || !query.contains('?') {
        return Cow::Borrowed(query);
    }

    let mut out = String::with_capacity(query.len() + 8);
    let mut in_literal = false;
    for ch in query.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => out.push_str("%s"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Renders `query` with `args` interpolated, for log output only.
///
/// Bare `?` consumes the next argument; `?N` refers to argument `N`
/// (1-based). Placeholders without a matching argument are kept verbatim.
/// The result is never sent to the database.
pub fn render_query(query: &str, args: &[&dyn ToSql]) -> String {
    let mut out = String::with_capacity(query.len() + args.len() * 8);
    let mut next_arg = 0usize;
    let mut in_literal = false;
    let mut chars = query.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if ch == '\'' {
            in_literal = !in_literal;
            out.push(ch);
            continue;
        }
        if ch != '?' || in_literal {
            out.push(ch);
            continue;
        }

        let mut digits = String::new();
        while let Some((_, d)) = chars.peek().copied() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }

        let index = if digits.is_empty() {
            let index = next_arg;
            next_arg += 1;
            Some(index)
        } else {
            digits.parse::<usize>().ok().and_then(|n| n.checked_sub(1))
        };

        match index.and_then(|i| args.get(i)) {
            Some(arg) => out.push_str(&render_arg(*arg)),
            None => {
                out.push('?');
                out.push_str(&digits);
            }
        }
    }
    out
}

fn render_arg(arg: &dyn ToSql) -> String {
    match arg.to_sql() {
        Ok(ToSqlOutput::Borrowed(value)) => render_value_ref(value),
        Ok(ToSqlOutput::Owned(value)) => render_value(&value),
        #[allow(unreachable_patterns)]
        Ok(_) => "<value>".to_string(),
        Err(_) => "<unrenderable>".to_string(),
    }
}

/// Renders a single SQL value as a literal.
pub fn render_value(value: &Value) -> String {
    render_value_ref(ValueRef::from(value))
}

fn render_value_ref(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(r) => r.to_string(),
        ValueRef::Text(bytes) => {
            format!("'{}'", String::from_utf8_lossy(bytes).replace('\'', "''"))
        }
        ValueRef::Blob(bytes) => format!("X'{}'", hex::encode_upper(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_only_for_pyformat_engine() {
        let query = "SELECT * FROM base_user WHERE id = ? AND email = ?";
        assert_eq!(
            rewrite_placeholders(query, PYFORMAT_ENGINE),
            "SELECT * FROM base_user WHERE id = %s AND email = %s"
        );
    }

    #[test]
    fn other_engines_pass_through_unchanged() {
        let query = "SELECT * FROM base_user WHERE id = ? AND email = ?";
        for engine in [SQLITE_ENGINE, "mysql", "postgresql", "", "POSTGRESQL_PSYCOPG2"] {
            let out = rewrite_placeholders(query, engine);
            assert!(matches!(out, Cow::Borrowed(_)), "engine {engine:?} should borrow");
            assert_eq!(out.as_bytes(), query.as_bytes());
        }
    }

    #[test]
    fn rewrite_skips_string_literals() {
        let query = "SELECT 'why?' , body FROM base_comment WHERE id = ?";
        assert_eq!(
            rewrite_placeholders(query, PYFORMAT_ENGINE),
            "SELECT 'why?' , body FROM base_comment WHERE id = %s"
        );
    }

    #[test]
    fn render_interpolates_positional_args() {
        let rendered = render_query(
            "UPDATE base_user SET firstname = ? WHERE id = ? AND guest = ?",
            &[&"O'Neil", &7i64, &rusqlite::types::Null],
        );
        assert_eq!(
            rendered,
            "UPDATE base_user SET firstname = 'O''Neil' WHERE id = 7 AND guest = NULL"
        );
    }

    #[test]
    fn render_handles_numbered_and_missing_args() {
        let rendered = render_query("SELECT ?2, ?1, ?, ?3", &[&1i64, &2.5f64]);
        assert_eq!(rendered, "SELECT 2.5, 1, 1, ?3");
    }

    #[test]
    fn render_blob_as_hex_literal() {
        let blob: Vec<u8> = vec![0xde, 0xad];
        assert_eq!(render_query("SELECT ?", &[&blob]), "SELECT X'DEAD'");
    }
}
