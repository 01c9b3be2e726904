//! PostgreSQL functions.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EntityError, Result};
use crate::statement::{
    coerce_to_quoted, coerce_to_unquoted, escape_colon_for_sql, normalize_whitespace,
    strip_terminating_semicolon, unescape_colon_for_sql,
};

/// Parse templates, most specific first. The first complete match wins.
static TEMPLATES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Definition starting with a RETURNS clause.
        Regex::new(
            r#"(?is)^\s*create(?:\s+or\s+replace)?\s+function\s+(?P<schema>[\w"]+)\.(?P<signature>.+?\))\s*(?P<definition>returns\s.+)$"#,
        )
        .expect("static regex"),
        // Anything after the signature (e.g. procedural bodies).
        Regex::new(
            r#"(?is)^\s*create(?:\s+or\s+replace)?\s+function\s+(?P<schema>[\w"]+)\.(?P<signature>.+?\))\s*(?P<definition>.+)$"#,
        )
        .expect("static regex"),
    ]
});

/// A PostgreSQL function.
///
/// The signature is the function's name plus its identity argument list,
/// e.g. `to_upper(some_text text)`; overloads are distinct entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgFunction {
    schema: String,
    signature: String,
    definition: String,
}

impl PgFunction {
    /// Creates a function entity from its schema, call signature and body.
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

    /// Parses a `CREATE [OR REPLACE] FUNCTION` statement.
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
            kind: "function",
            sql: sql.to_string(),
        })
    }

    /// Schema name, unquoted.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Call signature including the argument list, unquoted.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Function body, starting at the `RETURNS` clause.
    #[must_use]
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Signature with the function name quoted and the arguments kept as-is.
    #[must_use]
    pub fn literal_signature(&self) -> String {
        match self.signature.split_once('(') {
            Some((name, args)) => format!("\"{}\"({}", name.trim(), args),
            None => coerce_to_quoted(&self.signature),
        }
    }

    /// Generates the `CREATE FUNCTION` statement.
    #[must_use]
    pub fn to_sql_statement_create(&self) -> Vec<String> {
        vec![format!(
            "CREATE FUNCTION {}.{} {}",
            coerce_to_quoted(&self.schema),
            self.literal_signature(),
            unescape_colon_for_sql(&self.definition),
        )]
    }

    /// Generates the `DROP FUNCTION` statement.
    #[must_use]
    pub fn to_sql_statement_drop(&self, cascade: bool) -> Vec<String> {
        let cascade = if cascade { " CASCADE" } else { "" };
        vec![format!(
            "DROP FUNCTION {}.{}{}",
            coerce_to_quoted(&self.schema),
            self.literal_signature(),
            cascade,
        )]
    }

    /// Generates the `CREATE OR REPLACE FUNCTION` statement.
    #[must_use]
    pub fn to_sql_statement_create_or_replace(&self) -> Vec<String> {
        vec![format!(
            "CREATE OR REPLACE FUNCTION {}.{} {}",
            coerce_to_quoted(&self.schema),
            self.literal_signature(),
            unescape_colon_for_sql(&self.definition),
        )]
    }

    /// Renders Rust source reconstructing this instance.
    #[must_use]
    pub fn render_self_for_migration(&self) -> String {
        let var_name = super::variable_name(&self.schema, &self.signature);
        format!(
            "let {} = PgFunction::new(\n    \"{}\",\n    \"{}\",\n    r#\"{}\"#,\n);\n",
            var_name, self.schema, self.signature, self.definition,
        )
    }
}
