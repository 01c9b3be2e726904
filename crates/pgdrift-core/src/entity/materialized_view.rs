//! PostgreSQL materialized views.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EntityError, Result};
use crate::statement::{
    coerce_to_quoted, coerce_to_unquoted, escape_colon_for_sql, normalize_whitespace,
    strip_terminating_semicolon, unescape_colon_for_sql,
};

/// Templates ordered so the optional trailing `WITH [NO] DATA` clause is
/// consumed before the bare form swallows it into the definition.
static TEMPLATES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(
            r#"(?is)^\s*create\s+materialized\s+view\s+(?P<schema>[\w"]+)\.(?P<signature>[^\s(]+(?:\s*\([^)]*\))?)\s+as\s+(?P<definition>.+?)\s+with\s+no\s+data$"#,
        )
        .expect("static regex"),
        Regex::new(
            r#"(?is)^\s*create\s+materialized\s+view\s+(?P<schema>[\w"]+)\.(?P<signature>[^\s(]+(?:\s*\([^)]*\))?)\s+as\s+(?P<definition>.+?)\s+with\s+data$"#,
        )
        .expect("static regex"),
        Regex::new(
            r#"(?is)^\s*create\s+materialized\s+view\s+(?P<schema>[\w"]+)\.(?P<signature>[^\s(]+(?:\s*\([^)]*\))?)\s+as\s+(?P<definition>.+)$"#,
        )
        .expect("static regex"),
    ]
});

/// A PostgreSQL materialized view.
///
/// Materialized views have no native `CREATE OR REPLACE`; replacing one
/// decomposes into drop-then-create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgMaterializedView {
    schema: String,
    signature: String,
    definition: String,
    with_data: bool,
    indexes: Vec<String>,
}

impl PgMaterializedView {
    /// Creates a materialized view entity. Data is populated on create by
    /// default; see [`PgMaterializedView::with_data`].
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
            with_data: true,
            indexes: Vec::new(),
        }
    }

    /// Controls whether create and replace statements populate data.
    #[must_use]
    pub fn with_data(mut self, with_data: bool) -> Self {
        self.with_data = with_data;
        self
    }

    /// Attaches `CREATE INDEX` statements emitted after the view itself.
    ///
    /// Indexes on a materialized view are dropped with it, so replacing the
    /// view must recreate them; carrying them on the entity keeps create and
    /// replace statements complete.
    #[must_use]
    pub fn with_indexes<I, S>(mut self, indexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes = indexes
            .into_iter()
            .map(|statement| {
                escape_colon_for_sql(&strip_terminating_semicolon(&statement.into()))
            })
            .collect();
        self
    }

    /// Parses a `CREATE MATERIALIZED VIEW` statement, tolerating the
    /// optional `WITH [NO] DATA` clause.
    pub fn from_sql(sql: &str) -> Result<Self> {
        let stripped = strip_terminating_semicolon(sql);
        for (index, template) in TEMPLATES.iter().enumerate() {
            if let Some(captures) = template.captures(&stripped) {
                let no_data = index == 0;
                // A column list in the signature, e.g. my_view (a, b), is
                // not part of the name.
                let signature = captures["signature"]
                    .split('(')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                return Ok(Self::new(
                    &captures["schema"],
                    signature,
                    &captures["definition"],
                )
                .with_data(!no_data));
            }
        }
        Err(EntityError::ParseFailure {
            kind: "materialized view",
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

    /// Whether create statements populate data.
    #[must_use]
    pub fn is_with_data(&self) -> bool {
        self.with_data
    }

    /// Attached index statements.
    #[must_use]
    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    /// Generates the `CREATE MATERIALIZED VIEW` statement, followed by the
    /// attached index statements.
    #[must_use]
    pub fn to_sql_statement_create(&self) -> Vec<String> {
        let data_clause = if self.with_data { "WITH DATA" } else { "WITH NO DATA" };
        let mut statements = vec![format!(
            "CREATE MATERIALIZED VIEW {}.\"{}\" AS {} {}",
            coerce_to_quoted(&self.schema),
            self.signature,
            unescape_colon_for_sql(&self.definition),
            data_clause,
        )];
        statements.extend(self.indexes.iter().map(|index| unescape_colon_for_sql(index)));
        statements
    }

    /// Generates the `DROP MATERIALIZED VIEW` statement.
    #[must_use]
    pub fn to_sql_statement_drop(&self, cascade: bool) -> Vec<String> {
        let cascade = if cascade { " CASCADE" } else { "" };
        vec![format!(
            "DROP MATERIALIZED VIEW {}.\"{}\"{}",
            coerce_to_quoted(&self.schema),
            self.signature,
            cascade,
        )]
    }

    /// Replacement decomposes into drop-if-exists followed by create.
    #[must_use]
    pub fn to_sql_statement_create_or_replace(&self) -> Vec<String> {
        let mut statements = vec![format!(
            "DROP MATERIALIZED VIEW IF EXISTS {}.\"{}\"",
            coerce_to_quoted(&self.schema),
            self.signature,
        )];
        statements.extend(self.to_sql_statement_create());
        statements
    }

    /// Renders Rust source reconstructing this instance.
    #[must_use]
    pub fn render_self_for_migration(&self) -> String {
        let var_name = super::variable_name(&self.schema, &self.signature);
        let data_builder = if self.with_data {
            String::new()
        } else {
            "\n.with_data(false)".to_string()
        };
        let index_builder = if self.indexes.is_empty() {
            String::new()
        } else {
            let statements = self
                .indexes
                .iter()
                .map(|index| format!("r#\"{index}\"#"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("\n.with_indexes([{statements}])")
        };
        format!(
            "let {} = PgMaterializedView::new(\n    \"{}\",\n    \"{}\",\n    r#\"{}\"#,\n){}{};\n",
            var_name, self.schema, self.signature, self.definition, data_builder, index_builder,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_no_data_clause() {
        let view = PgMaterializedView::from_sql(
            "create materialized view public.mv as select 1 as x with no data;",
        )
        .unwrap();
        assert_eq!(view.signature(), "mv");
        assert_eq!(view.definition(), "select 1 as x");
        assert!(!view.is_with_data());
    }

    #[test]
    fn bare_form_defaults_to_with_data() {
        let view =
            PgMaterializedView::from_sql("create materialized view public.mv as select 1 as x")
                .unwrap();
        assert!(view.is_with_data());
        assert_eq!(view.definition(), "select 1 as x");
    }

    #[test]
    fn column_list_is_stripped_from_signature() {
        let view = PgMaterializedView::from_sql(
            "create materialized view public.mv (a, b) as select 1, 2",
        )
        .unwrap();
        assert_eq!(view.signature(), "mv");
    }

    #[test]
    fn replace_is_drop_then_create() {
        let view = PgMaterializedView::new("public", "mv", "select 1");
        let statements = view.to_sql_statement_create_or_replace();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("DROP MATERIALIZED VIEW IF EXISTS"));
        assert!(statements[1].starts_with("CREATE MATERIALIZED VIEW"));
        assert!(statements[1].ends_with("WITH DATA"));
    }

    #[test]
    fn attached_indexes_follow_the_create() {
        let view = PgMaterializedView::new("public", "mv", "select 1 as x").with_indexes([
            "create index ix_mv_x on public.mv (x)",
        ]);
        let statements = view.to_sql_statement_create();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1], "create index ix_mv_x on public.mv (x)");

        // Replacing recreates the indexes along with the view.
        let replace = view.to_sql_statement_create_or_replace();
        assert_eq!(replace.len(), 3);
        assert!(replace[2].starts_with("create index"));

        let rendered = view.render_self_for_migration();
        assert!(rendered.contains(".with_indexes([r#\"create index ix_mv_x"));
    }

    #[test]
    fn create_round_trips() {
        let view = PgMaterializedView::new("public", "mv", "select 1 as x").with_data(false);
        let create = view.to_sql_statement_create().remove(0);
        let reparsed = PgMaterializedView::from_sql(&create).unwrap();
        assert_eq!(reparsed, view);
    }
}
