//! Check-constraint comparison.
//!
//! Check constraints are identified by `(table, name)` rather than a global
//! identity string, so they get their own comparison path. The feature is
//! opt-in: scope [`CheckConstraintScope::Disabled`] (the default) performs
//! no comparison at all.

use std::collections::BTreeMap;

use pgdrift_core::{MigrationOperation, SchemaMetadata, TableMetadata};
use sqlx::PgConnection;
use tracing::debug;

use crate::error::{DriftError, Result};
use crate::reflect::{reflect_check_constraints, ReflectedCheckConstraint};

/// Which schemas participate in check-constraint comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CheckConstraintScope {
    /// No comparison is performed.
    #[default]
    Disabled,
    /// Compare tables in the default schema (`public`) only.
    DefaultSchema,
    /// Compare tables in exactly these schemas.
    Schemas(Vec<String>),
}

impl CheckConstraintScope {
    /// The schemas to compare, or `None` when disabled.
    #[must_use]
    pub fn schemas(&self) -> Option<Vec<String>> {
        match self {
            Self::Disabled => None,
            Self::DefaultSchema => Some(vec!["public".to_string()]),
            Self::Schemas(schemas) => Some(schemas.clone()),
        }
    }
}

/// `(table, constraint name)` → check expression.
type ConstraintSet = BTreeMap<(String, String), String>;

/// Collects the declared constraints for one schema, validating them
/// eagerly — before any database interaction.
///
/// An unnamed constraint is a hard configuration error. A constraint whose
/// columns are missing from its owning table is skipped when those columns
/// exist on some other declared table (tolerates partial declarations), and
/// a [`DriftError::DanglingColumnReference`] when they exist nowhere.
fn collect_declared_constraints(metadata: &SchemaMetadata, schema: &str) -> Result<ConstraintSet> {
    let mut declared = ConstraintSet::new();
    for table in metadata.tables_in_schema(schema) {
        for constraint in &table.check_constraints {
            let Some(name) = &constraint.name else {
                return Err(DriftError::UnnamedConstraint {
                    schema: schema.to_string(),
                    table: table.name.clone(),
                });
            };
            let missing_here: Vec<&String> = constraint
                .columns
                .iter()
                .filter(|column| !table.has_column(column))
                .collect();
            if !missing_here.is_empty() {
                let missing_everywhere: Vec<String> = missing_here
                    .iter()
                    .filter(|column| !metadata.any_table_has_column(column))
                    .map(|column| (*column).clone())
                    .collect();
                if !missing_everywhere.is_empty() {
                    return Err(DriftError::DanglingColumnReference {
                        schema: schema.to_string(),
                        table: table.name.clone(),
                        name: name.clone(),
                        columns: missing_everywhere,
                    });
                }
                debug!(
                    constraint = %name,
                    table = %table.name,
                    "columns live on another table, skipping constraint"
                );
                continue;
            }
            declared.insert(
                (table.name.clone(), name.clone()),
                constraint.expression.clone(),
            );
        }
    }
    Ok(declared)
}

/// Whether a reflected constraint name is the synthetic
/// `{table}_{column}_check` the database creates for an emulated enum
/// column. Synthetic constraints are not user-declared and must never be
/// proposed for drop.
fn is_synthetic_enum_constraint(table: &TableMetadata, constraint_name: &str) -> bool {
    table
        .non_native_enum_columns()
        .iter()
        .any(|column| constraint_name == format!("{}_{}_check", table.name, column))
}

/// Narrows reflected constraints to the tables the metadata declares.
///
/// Comparison is scoped to declared tables: a constraint on a table the
/// metadata never mentions is outside the comparison and must not be
/// proposed for drop. Synthetic enum-backed constraints are filtered out
/// here too.
fn filter_reflected_constraints(
    metadata: &SchemaMetadata,
    schema: &str,
    reflected: Vec<ReflectedCheckConstraint>,
) -> ConstraintSet {
    let mut kept = ConstraintSet::new();
    for constraint in reflected {
        let Some(table) = metadata
            .tables_in_schema(schema)
            .find(|table| table.name == constraint.table)
        else {
            debug!(
                constraint = %constraint.name,
                table = %constraint.table,
                "table not declared, constraint out of scope"
            );
            continue;
        };
        if is_synthetic_enum_constraint(table, &constraint.name) {
            continue;
        }
        kept.insert((constraint.table, constraint.name), constraint.expression);
    }
    kept
}

/// Compares declared check constraints against the database.
///
/// Set difference on `(table, name)` within each scoped schema: unmatched
/// declared pairs become [`MigrationOperation::AddCheckConstraint`],
/// unmatched reflected pairs become
/// [`MigrationOperation::DropCheckConstraint`] carrying the reflected
/// expression so the drop stays reversible.
pub async fn compare_check_constraints(
    conn: &mut PgConnection,
    metadata: &SchemaMetadata,
    scope: &CheckConstraintScope,
) -> Result<Vec<MigrationOperation>> {
    let Some(schemas) = scope.schemas() else {
        return Ok(Vec::new());
    };

    // Validate every scoped schema up front so a configuration error
    // surfaces before the first catalog query.
    let mut declared_by_schema: Vec<(String, ConstraintSet)> = Vec::with_capacity(schemas.len());
    for schema in schemas {
        let declared = collect_declared_constraints(metadata, &schema)?;
        declared_by_schema.push((schema, declared));
    }

    let mut operations = Vec::new();
    for (schema, declared) in declared_by_schema {
        let reflected = filter_reflected_constraints(
            metadata,
            &schema,
            reflect_check_constraints(&mut *conn, &schema).await?,
        );

        for ((table, name), expression) in &declared {
            if !reflected.contains_key(&(table.clone(), name.clone())) {
                operations.push(MigrationOperation::AddCheckConstraint {
                    schema: schema.clone(),
                    table: table.clone(),
                    name: name.clone(),
                    expression: expression.clone(),
                });
            }
        }
        for ((table, name), expression) in &reflected {
            if !declared.contains_key(&(table.clone(), name.clone())) {
                operations.push(MigrationOperation::DropCheckConstraint {
                    schema: schema.clone(),
                    table: table.clone(),
                    name: name.clone(),
                    expression: expression.clone(),
                });
            }
        }
    }
    Ok(operations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgdrift_core::{CheckConstraintDef, ColumnMetadata};

    fn account_table() -> TableMetadata {
        TableMetadata::new("account")
            .column(ColumnMetadata::new("balance", "numeric"))
            .column(ColumnMetadata::new("status", "varchar").non_native_enum())
    }

    #[test]
    fn named_constraint_is_collected() {
        let metadata = SchemaMetadata::new().table(account_table().check_constraint(
            CheckConstraintDef::new(
                "ck_balance_positive",
                "balance >= 0",
                vec!["balance".to_string()],
            ),
        ));
        let declared = collect_declared_constraints(&metadata, "public").unwrap();
        assert_eq!(declared.len(), 1);
        assert_eq!(
            declared[&("account".to_string(), "ck_balance_positive".to_string())],
            "balance >= 0",
        );
    }

    #[test]
    fn unnamed_constraint_fails_during_collection() {
        let metadata = SchemaMetadata::new().table(account_table().check_constraint(
            CheckConstraintDef::unnamed("balance >= 0", vec!["balance".to_string()]),
        ));
        let err = collect_declared_constraints(&metadata, "public").unwrap_err();
        assert!(matches!(err, DriftError::UnnamedConstraint { .. }));
    }

    #[test]
    fn constraint_on_another_tables_columns_is_skipped() {
        let other = TableMetadata::new("ledger").column(ColumnMetadata::new("amount", "numeric"));
        let metadata = SchemaMetadata::new()
            .table(account_table().check_constraint(CheckConstraintDef::new(
                "ck_amount_positive",
                "amount >= 0",
                vec!["amount".to_string()],
            )))
            .table(other);
        let declared = collect_declared_constraints(&metadata, "public").unwrap();
        assert!(declared.is_empty());
    }

    #[test]
    fn constraint_on_unknown_columns_is_an_error() {
        let metadata = SchemaMetadata::new().table(account_table().check_constraint(
            CheckConstraintDef::new(
                "ck_ghost",
                "ghost_column > 0",
                vec!["ghost_column".to_string()],
            ),
        ));
        let err = collect_declared_constraints(&metadata, "public").unwrap_err();
        match err {
            DriftError::DanglingColumnReference { columns, .. } => {
                assert_eq!(columns, vec!["ghost_column".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn reflected(table: &str, name: &str, expression: &str) -> ReflectedCheckConstraint {
        ReflectedCheckConstraint {
            schema: "public".to_string(),
            table: table.to_string(),
            name: name.to_string(),
            expression: expression.to_string(),
        }
    }

    #[test]
    fn constraints_on_undeclared_tables_are_ignored() {
        let metadata = SchemaMetadata::new().table(account_table());
        let kept = filter_reflected_constraints(
            &metadata,
            "public",
            vec![
                reflected("account", "ck_balance_positive", "balance >= 0"),
                reflected("untracked", "ck_other", "amount >= 0"),
                reflected("account", "account_status_check", "status in ('a', 'b')"),
            ],
        );
        assert_eq!(kept.len(), 1);
        assert!(kept.contains_key(&("account".to_string(), "ck_balance_positive".to_string())));
    }

    #[test]
    fn enum_backed_constraint_names_are_synthetic() {
        let table = account_table();
        assert!(is_synthetic_enum_constraint(&table, "account_status_check"));
        assert!(!is_synthetic_enum_constraint(&table, "account_balance_check"));
        assert!(!is_synthetic_enum_constraint(&table, "ck_balance_positive"));
    }

    #[test]
    fn scope_resolves_to_schema_lists() {
        assert_eq!(CheckConstraintScope::Disabled.schemas(), None);
        assert_eq!(
            CheckConstraintScope::DefaultSchema.schemas(),
            Some(vec!["public".to_string()]),
        );
        assert_eq!(
            CheckConstraintScope::Schemas(vec!["billing".to_string()]).schemas(),
            Some(vec!["billing".to_string()]),
        );
    }
}
