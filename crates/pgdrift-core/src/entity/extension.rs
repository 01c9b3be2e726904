//! PostgreSQL extensions.
//!
//! Extensions are named globally within a database, so their identity omits
//! the schema even though they install their objects into one.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EntityError, Result};
use crate::statement::{coerce_to_unquoted, normalize_whitespace, strip_terminating_semicolon};

static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*create\s+extension\s+(?:if\s+not\s+exists\s+)?(?P<signature>[\w"]+)(?:\s+(?:with\s+)?schema\s+(?P<schema>[\w"]+))?\s*$"#,
    )
    .expect("static regex")
});

/// A PostgreSQL extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgExtension {
    schema: String,
    signature: String,
}

impl PgExtension {
    /// Creates an extension entity.
    #[must_use]
    pub fn new(schema: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            schema: coerce_to_unquoted(&normalize_whitespace(&schema.into())),
            signature: coerce_to_unquoted(&normalize_whitespace(&signature.into())),
        }
    }

    /// Parses a `CREATE EXTENSION` statement. A missing `SCHEMA` clause
    /// defaults to `public`.
    pub fn from_sql(sql: &str) -> Result<Self> {
        let stripped = strip_terminating_semicolon(sql);
        let Some(captures) = TEMPLATE.captures(&stripped) else {
            return Err(EntityError::ParseFailure {
                kind: "extension",
                sql: sql.to_string(),
            });
        };
        let schema = captures
            .name("schema")
            .map_or("public", |capture| capture.as_str());
        Ok(Self::new(schema, &captures["signature"]))
    }

    /// Schema the extension installs into, unquoted.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Extension name, unquoted.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Synthetic definition used for change detection; extensions carry no
    /// SQL body of their own.
    #[must_use]
    pub fn definition(&self) -> String {
        format!("extension: {} {}", self.schema, self.signature)
    }

    /// Generates the `CREATE EXTENSION` statement.
    #[must_use]
    pub fn to_sql_statement_create(&self) -> Vec<String> {
        vec![format!(
            "CREATE EXTENSION \"{}\" WITH SCHEMA \"{}\"",
            self.signature, self.schema,
        )]
    }

    /// Generates the `DROP EXTENSION` statement.
    #[must_use]
    pub fn to_sql_statement_drop(&self, cascade: bool) -> Vec<String> {
        let cascade = if cascade { " CASCADE" } else { "" };
        vec![format!("DROP EXTENSION \"{}\"{}", self.signature, cascade)]
    }

    /// Extensions cannot be replaced in place.
    pub fn to_sql_statement_create_or_replace(&self) -> Result<Vec<String>> {
        Err(EntityError::NotSupported {
            kind: "extension",
            operation: "create or replace",
        })
    }

    /// Renders Rust source reconstructing this instance.
    #[must_use]
    pub fn render_self_for_migration(&self) -> String {
        let var_name = super::variable_name(&self.schema, &self.signature);
        format!(
            "let {} = PgExtension::new(\"{}\", \"{}\");\n",
            var_name, self.schema, self.signature,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_create_extension() {
        let extension = PgExtension::from_sql("create extension pg_trgm").unwrap();
        assert_eq!(extension.signature(), "pg_trgm");
        assert_eq!(extension.schema(), "public");
    }

    #[test]
    fn parses_if_not_exists_with_schema() {
        let extension =
            PgExtension::from_sql("CREATE EXTENSION IF NOT EXISTS citext WITH SCHEMA extensions;")
                .unwrap();
        assert_eq!(extension.signature(), "citext");
        assert_eq!(extension.schema(), "extensions");
    }

    #[test]
    fn create_statement_is_schema_qualified() {
        let extension = PgExtension::new("public", "pg_trgm");
        assert_eq!(
            extension.to_sql_statement_create(),
            vec![r#"CREATE EXTENSION "pg_trgm" WITH SCHEMA "public""#.to_string()],
        );
    }

    #[test]
    fn replace_is_not_supported() {
        let extension = PgExtension::new("public", "pg_trgm");
        assert!(matches!(
            extension.to_sql_statement_create_or_replace(),
            Err(EntityError::NotSupported { .. }),
        ));
    }
}
