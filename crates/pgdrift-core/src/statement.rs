//! SQL statement text utilities.
//!
//! Every entity kind normalizes its fields through these helpers so that
//! model-declared and database-reflected instances compare on equal footing.

/// Collapses all runs of whitespace to single spaces and trims both ends.
///
/// Idempotent: applying it twice is the same as applying it once.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes identifier quoting from every dot-separated segment.
///
/// Unquoting an unquoted identifier is a no-op.
#[must_use]
pub fn coerce_to_unquoted(text: &str) -> String {
    text.replace('"', "")
}

/// Wraps each dot-separated segment of an identifier in double quotes.
///
/// Quoting an already-quoted segment is a no-op.
#[must_use]
pub fn coerce_to_quoted(text: &str) -> String {
    text.split('.')
        .map(|part| {
            let trimmed = part.trim_matches('"');
            format!("\"{}\"", trimmed)
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Removes at most one trailing semicolon, plus surrounding whitespace.
#[must_use]
pub fn strip_terminating_semicolon(sql: &str) -> String {
    let trimmed = sql.trim();
    match trimmed.strip_suffix(';') {
        Some(rest) => rest.trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// Escapes literal colons so downstream execution layers that treat `:name`
/// as a bind parameter do not misinterpret entity bodies (e.g. `1::bigint`).
///
/// Colons already escaped are left alone, so re-application is a no-op.
#[must_use]
pub fn escape_colon_for_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut escaped = false;
    for ch in sql.chars() {
        match ch {
            '\\' => {
                escaped = !escaped;
                out.push(ch);
            }
            ':' => {
                if !escaped {
                    out.push('\\');
                }
                out.push(ch);
                escaped = false;
            }
            _ => {
                escaped = false;
                out.push(ch);
            }
        }
    }
    out
}

/// Inverse of [`escape_colon_for_sql`], applied when rendering executable
/// DDL: PostgreSQL itself must receive plain colons.
#[must_use]
pub fn unescape_colon_for_sql(sql: &str) -> String {
    sql.replace("\\:", ":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_whitespace_collapses_and_trims() {
        assert_eq!(normalize_whitespace("  select \n\t 1  "), "select 1");
        assert_eq!(normalize_whitespace("a  b"), "a b");
    }

    #[test]
    fn normalize_whitespace_is_idempotent() {
        let once = normalize_whitespace("  a \n b  ");
        assert_eq!(normalize_whitespace(&once), once);
    }

    #[test]
    fn quote_coercion_round_trips() {
        assert_eq!(coerce_to_quoted("public"), "\"public\"");
        assert_eq!(coerce_to_quoted("\"public\""), "\"public\"");
        assert_eq!(coerce_to_quoted("public.my_view"), "\"public\".\"my_view\"");
        assert_eq!(coerce_to_unquoted("\"public\""), "public");
        assert_eq!(coerce_to_unquoted("public"), "public");

        let x = "MySchema";
        assert_eq!(
            coerce_to_unquoted(&coerce_to_quoted(&coerce_to_unquoted(x))),
            coerce_to_unquoted(x)
        );
    }

    #[test]
    fn strip_semicolon_removes_at_most_one() {
        assert_eq!(strip_terminating_semicolon("select 1;"), "select 1");
        assert_eq!(strip_terminating_semicolon("select 1 ; "), "select 1");
        assert_eq!(strip_terminating_semicolon("select 1;;"), "select 1;");
        assert_eq!(strip_terminating_semicolon("select 1"), "select 1");
    }

    #[test]
    fn colon_escape_is_idempotent() {
        let escaped = escape_colon_for_sql("select 1::bigint");
        assert_eq!(escaped, "select 1\\:\\:bigint");
        assert_eq!(escape_colon_for_sql(&escaped), escaped);
    }

    #[test]
    fn colon_escape_round_trips() {
        let original = "select x::text, y::int";
        let escaped = escape_colon_for_sql(original);
        assert_eq!(unescape_colon_for_sql(&escaped), original);
    }
}
