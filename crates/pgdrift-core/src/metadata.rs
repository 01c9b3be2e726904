//! Declarative table metadata.
//!
//! The check-constraint comparator needs to know which tables and columns
//! the application declares, without owning a full table-diff model. Hosts
//! describe just enough here: tables, their columns, and the named check
//! constraints attached to them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A column declared on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,
    /// SQL type as declared, e.g. `text` or `numeric(10,2)`.
    pub sql_type: String,
    /// Whether the column's type is an enum emulated with a check
    /// constraint rather than a native PostgreSQL enum type. The database
    /// synthesizes a `{table}_{column}_check` constraint for these, which
    /// the comparator must not flag.
    pub non_native_enum: bool,
}

impl ColumnMetadata {
    /// Declares a plain column.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            non_native_enum: false,
        }
    }

    /// Marks the column as an emulated (non-native) enum.
    #[must_use]
    pub fn non_native_enum(mut self) -> Self {
        self.non_native_enum = true;
        self
    }
}

/// A check constraint declared on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraintDef {
    /// Constraint name. Unnamed constraints cannot be compared and are
    /// rejected during collection.
    pub name: Option<String>,
    /// The check expression, without the `CHECK (..)` wrapper.
    pub expression: String,
    /// Names of the columns the expression references.
    pub columns: Vec<String>,
}

impl CheckConstraintDef {
    /// Declares a named check constraint.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        expression: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            expression: expression.into(),
            columns,
        }
    }

    /// Declares an anonymous check constraint. These are rejected at
    /// comparison time; the constructor exists so hosts can round-trip
    /// metadata they intend to fix.
    #[must_use]
    pub fn unnamed(expression: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: None,
            expression: expression.into(),
            columns,
        }
    }
}

/// A table declared by the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table schema; `None` means the default schema (`public`).
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
    /// Declared columns.
    pub columns: Vec<ColumnMetadata>,
    /// Declared check constraints.
    pub check_constraints: Vec<CheckConstraintDef>,
}

impl TableMetadata {
    /// Declares a table in the default schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            columns: Vec::new(),
            check_constraints: Vec::new(),
        }
    }

    /// Sets the table's schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a check constraint.
    #[must_use]
    pub fn check_constraint(mut self, constraint: CheckConstraintDef) -> Self {
        self.check_constraints.push(constraint);
        self
    }

    /// The effective schema, with `None` resolved to `public`.
    #[must_use]
    pub fn effective_schema(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }

    /// Whether the table declares a column with this name.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    /// The declared non-native-enum column names.
    #[must_use]
    pub fn non_native_enum_columns(&self) -> BTreeSet<&str> {
        self.columns
            .iter()
            .filter(|column| column.non_native_enum)
            .map(|column| column.name.as_str())
            .collect()
    }
}

/// The full set of tables a host declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    /// Declared tables.
    pub tables: Vec<TableMetadata>,
}

impl SchemaMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table.
    #[must_use]
    pub fn table(mut self, table: TableMetadata) -> Self {
        self.tables.push(table);
        self
    }

    /// Every schema named by a declared table, with `None` resolved to
    /// `public`.
    #[must_use]
    pub fn schemas(&self) -> BTreeSet<&str> {
        self.tables
            .iter()
            .map(TableMetadata::effective_schema)
            .collect()
    }

    /// Whether any declared table, in any schema, has the column.
    #[must_use]
    pub fn any_table_has_column(&self, column: &str) -> bool {
        self.tables.iter().any(|table| table.has_column(column))
    }

    /// Declared tables in the given schema.
    pub fn tables_in_schema<'a>(
        &'a self,
        schema: &'a str,
    ) -> impl Iterator<Item = &'a TableMetadata> {
        self.tables
            .iter()
            .filter(move |table| table.effective_schema() == schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_defaults_to_public() {
        let table = TableMetadata::new("account");
        assert_eq!(table.effective_schema(), "public");
        assert_eq!(
            TableMetadata::new("account").schema("billing").effective_schema(),
            "billing",
        );
    }

    #[test]
    fn metadata_schemas_deduplicate() {
        let metadata = SchemaMetadata::new()
            .table(TableMetadata::new("a"))
            .table(TableMetadata::new("b"))
            .table(TableMetadata::new("c").schema("reporting"));
        let schemas: Vec<_> = metadata.schemas().into_iter().collect();
        assert_eq!(schemas, vec!["public", "reporting"]);
    }

    #[test]
    fn column_lookup_spans_tables() {
        let metadata = SchemaMetadata::new()
            .table(TableMetadata::new("a").column(ColumnMetadata::new("x", "int")))
            .table(TableMetadata::new("b").column(ColumnMetadata::new("y", "text")));
        assert!(metadata.any_table_has_column("y"));
        assert!(!metadata.any_table_has_column("z"));
    }

    #[test]
    fn non_native_enum_columns_are_flagged() {
        let table = TableMetadata::new("account")
            .column(ColumnMetadata::new("status", "varchar").non_native_enum())
            .column(ColumnMetadata::new("email", "text"));
        let flagged = table.non_native_enum_columns();
        assert!(flagged.contains("status"));
        assert!(!flagged.contains("email"));
    }
}
