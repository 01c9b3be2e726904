//! PostgreSQL triggers.
//!
//! A trigger's identity includes the table it fires on, since trigger names
//! are only unique per table.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EntityError, Result};
use crate::statement::{
    coerce_to_quoted, coerce_to_unquoted, escape_colon_for_sql, normalize_whitespace,
    strip_terminating_semicolon, unescape_colon_for_sql,
};

// `ON` must be a standalone word: an `UPDATE OF <column>` list can contain
// column names ending in "on", which a bare `on\s+` would bind to.
static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*create\s+(?:constraint\s+)?trigger\s+(?P<signature>[\w"]+)\s+(?P<definition>.+?\son\s+(?P<on_entity>[\w".]+)\s.+)$"#,
    )
    .expect("static regex")
});

static CONSTRAINT_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*create\s+constraint\s+trigger\s").expect("static regex"));

/// A PostgreSQL trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgTrigger {
    schema: String,
    signature: String,
    on_entity: String,
    definition: String,
    is_constraint: bool,
}

impl PgTrigger {
    /// Creates a trigger entity. `on_entity` is the schema-qualified table
    /// the trigger fires on; an unqualified name is taken to be in `public`.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        signature: impl Into<String>,
        on_entity: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        let on_entity = coerce_to_unquoted(&normalize_whitespace(&on_entity.into()));
        let on_entity = if on_entity.contains('.') {
            on_entity
        } else {
            format!("public.{on_entity}")
        };
        Self {
            schema: coerce_to_unquoted(&normalize_whitespace(&schema.into())),
            signature: coerce_to_unquoted(&normalize_whitespace(&signature.into())),
            on_entity,
            definition: escape_colon_for_sql(&strip_terminating_semicolon(&definition.into())),
            is_constraint: false,
        }
    }

    /// Marks the trigger as a `CONSTRAINT TRIGGER`.
    #[must_use]
    pub fn constraint(mut self, is_constraint: bool) -> Self {
        self.is_constraint = is_constraint;
        self
    }

    /// Parses a `CREATE [CONSTRAINT] TRIGGER` statement. The trigger's
    /// schema is derived from the table it fires on.
    pub fn from_sql(sql: &str) -> Result<Self> {
        let stripped = strip_terminating_semicolon(sql);
        let Some(captures) = TEMPLATE.captures(&stripped) else {
            return Err(EntityError::ParseFailure {
                kind: "trigger",
                sql: sql.to_string(),
            });
        };
        let on_entity = coerce_to_unquoted(&normalize_whitespace(&captures["on_entity"]));
        let schema = match on_entity.split_once('.') {
            Some((prefix, _)) => prefix.to_string(),
            None => "public".to_string(),
        };
        Ok(Self::new(
            schema,
            &captures["signature"],
            on_entity,
            &captures["definition"],
        )
        .constraint(CONSTRAINT_TEMPLATE.is_match(&stripped)))
    }

    /// Schema of the table the trigger fires on.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Trigger name, unquoted.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Schema-qualified table the trigger fires on.
    #[must_use]
    pub fn on_entity(&self) -> &str {
        &self.on_entity
    }

    /// The trigger body starting at the timing clause.
    #[must_use]
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Whether this is a `CONSTRAINT TRIGGER`.
    #[must_use]
    pub fn is_constraint(&self) -> bool {
        self.is_constraint
    }

    /// Generates the `CREATE [CONSTRAINT] TRIGGER` statement.
    #[must_use]
    pub fn to_sql_statement_create(&self) -> Vec<String> {
        let constraint = if self.is_constraint { "CONSTRAINT " } else { "" };
        vec![format!(
            "CREATE {}TRIGGER \"{}\" {}",
            constraint,
            self.signature,
            unescape_colon_for_sql(&self.definition),
        )]
    }

    /// Generates the `DROP TRIGGER ... ON table` statement.
    #[must_use]
    pub fn to_sql_statement_drop(&self, cascade: bool) -> Vec<String> {
        let cascade = if cascade { " CASCADE" } else { "" };
        vec![format!(
            "DROP TRIGGER \"{}\" ON {}{}",
            self.signature,
            coerce_to_quoted(&self.on_entity),
            cascade,
        )]
    }

    /// Triggers have no `CREATE OR REPLACE`; replacement decomposes into
    /// drop-if-exists followed by create.
    #[must_use]
    pub fn to_sql_statement_create_or_replace(&self) -> Vec<String> {
        let mut statements = vec![format!(
            "DROP TRIGGER IF EXISTS \"{}\" ON {}",
            self.signature,
            coerce_to_quoted(&self.on_entity),
        )];
        statements.extend(self.to_sql_statement_create());
        statements
    }

    /// Renders Rust source reconstructing this instance.
    #[must_use]
    pub fn render_self_for_migration(&self) -> String {
        let var_name = super::variable_name(&self.schema, &self.signature);
        let constraint_builder = if self.is_constraint {
            "\n.constraint(true)".to_string()
        } else {
            String::new()
        };
        format!(
            "let {} = PgTrigger::new(\n    \"{}\",\n    \"{}\",\n    \"{}\",\n    r#\"{}\"#,\n){};\n",
            var_name, self.schema, self.signature, self.on_entity, self.definition, constraint_builder,
        )
    }
}
