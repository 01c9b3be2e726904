//! PostgreSQL views.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EntityError, Result};
use crate::statement::{
    coerce_to_quoted, coerce_to_unquoted, escape_colon_for_sql, normalize_whitespace,
    strip_terminating_semicolon, unescape_colon_for_sql,
};

static TEMPLATES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(
        r#"(?is)^\s*create(?:\s+or\s+replace)?\s+view\s+(?P<schema>[\w"]+)\.(?P<signature>[\w"]+)\s+as\s+(?P<definition>.+)$"#,
    )
    .expect("static regex")]
});

/// A PostgreSQL view: a named `SELECT` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgView {
    schema: String,
    signature: String,
    definition: String,
}

impl PgView {
    /// Creates a view entity from its schema, name and `SELECT` body.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        signature: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            schema: coerce_to_unquoted(&normalize_whitespace(&schema.into())),
            signature: coerce_to_unquoted(&normalize_whitespace(&signature.into())),
            definition: escape_colon_for_sql(&strip_terminating_semicolon(&definition.into())),
        }
    }

    /// Parses a `CREATE [OR REPLACE] VIEW` statement.
    pub fn from_sql(sql: &str) -> Result<Self> {
        let stripped = strip_terminating_semicolon(sql);
        for template in TEMPLATES.iter() {
            if let Some(captures) = template.captures(&stripped) {
                return Ok(Self::new(
                    &captures["schema"],
                    &captures["signature"],
                    &captures["definition"],
                ));
            }
        }
        Err(EntityError::ParseFailure {
            kind: "view",
            sql: sql.to_string(),
        })
    }

    /// Schema name, unquoted.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// View name, unquoted.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The view's `SELECT` body.
    #[must_use]
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Generates the `CREATE VIEW` statement.
    #[must_use]
    pub fn to_sql_statement_create(&self) -> Vec<String> {
        vec![format!(
            "CREATE VIEW {}.\"{}\" AS {}",
            coerce_to_quoted(&self.schema),
            self.signature,
            unescape_colon_for_sql(&self.definition),
        )]
    }

    /// Generates the `DROP VIEW` statement.
    #[must_use]
    pub fn to_sql_statement_drop(&self, cascade: bool) -> Vec<String> {
        let cascade = if cascade { " CASCADE" } else { "" };
        vec![format!(
            "DROP VIEW {}.\"{}\"{}",
            coerce_to_quoted(&self.schema),
            self.signature,
            cascade,
        )]
    }

    /// Generates the `CREATE OR REPLACE VIEW` statement.
    #[must_use]
    pub fn to_sql_statement_create_or_replace(&self) -> Vec<String> {
        vec![format!(
            "CREATE OR REPLACE VIEW {}.\"{}\" AS {}",
            coerce_to_quoted(&self.schema),
            self.signature,
            unescape_colon_for_sql(&self.definition),
        )]
    }

    /// Renders Rust source reconstructing this instance.
    #[must_use]
    pub fn render_self_for_migration(&self) -> String {
        let var_name = super::variable_name(&self.schema, &self.signature);
        format!(
            "let {} = PgView::new(\n    \"{}\",\n    \"{}\",\n    r#\"{}\"#,\n);\n",
            var_name, self.schema, self.signature, self.definition,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qualified_view() {
        let view =
            PgView::from_sql("create view public.active_users as select * from users where active;")
                .unwrap();
        assert_eq!(view.schema(), "public");
        assert_eq!(view.signature(), "active_users");
        assert_eq!(view.definition(), "select * from users where active");
    }

    #[test]
    fn colons_in_body_are_escaped_and_round_trip() {
        let view = PgView::new("public", "root", "select 1::bigint as some_val");
        assert_eq!(view.definition(), "select 1\\:\\:bigint as some_val");

        let create = view.to_sql_statement_create().remove(0);
        assert_eq!(
            create,
            "CREATE VIEW \"public\".\"root\" AS select 1::bigint as some_val"
        );

        let reparsed = PgView::from_sql(&create).unwrap();
        assert_eq!(reparsed, view);
    }

    #[test]
    fn materialized_view_sql_does_not_match() {
        assert!(
            PgView::from_sql("create materialized view public.m as select 1").is_err()
        );
    }
}
