//! Migration operations produced by the diff engine.
//!
//! Every operation is reversible, so a downgrade script can always be
//! generated from the same diff that produced the upgrade.

use serde::{Deserialize, Serialize};

use crate::entity::ReplaceableEntity;
use crate::error::Result;
use crate::statement::coerce_to_quoted;

/// A single schema change detected by comparing declared entities against a
/// live database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MigrationOperation {
    /// Create an entity that exists locally but not in the database.
    Create {
        /// The entity to create.
        entity: ReplaceableEntity,
    },
    /// Drop an entity that exists in the database but not locally.
    Drop {
        /// The entity to drop, as reflected from the database.
        entity: ReplaceableEntity,
    },
    /// Replace a database entity whose definition has drifted.
    Replace {
        /// The desired entity.
        entity: ReplaceableEntity,
        /// The database's current rendering, kept so the operation can be
        /// reversed.
        previous: ReplaceableEntity,
    },
    /// Add a check constraint declared in table metadata but missing from
    /// the database.
    AddCheckConstraint {
        /// Schema of the owning table.
        schema: String,
        /// Owning table name.
        table: String,
        /// Constraint name.
        name: String,
        /// The check expression, without the `CHECK (..)` wrapper.
        expression: String,
    },
    /// Drop a check constraint present in the database but absent from
    /// table metadata.
    DropCheckConstraint {
        /// Schema of the owning table.
        schema: String,
        /// Owning table name.
        table: String,
        /// Constraint name.
        name: String,
        /// The reflected check expression, kept so the operation can be
        /// reversed.
        expression: String,
    },
}

impl MigrationOperation {
    /// Returns the operation that undoes this one.
    #[must_use]
    pub fn reverse(&self) -> MigrationOperation {
        match self {
            Self::Create { entity } => Self::Drop {
                entity: entity.clone(),
            },
            Self::Drop { entity } => Self::Create {
                entity: entity.clone(),
            },
            Self::Replace { entity, previous } => Self::Replace {
                entity: previous.clone(),
                previous: entity.clone(),
            },
            Self::AddCheckConstraint {
                schema,
                table,
                name,
                expression,
            } => Self::DropCheckConstraint {
                schema: schema.clone(),
                table: table.clone(),
                name: name.clone(),
                expression: expression.clone(),
            },
            Self::DropCheckConstraint {
                schema,
                table,
                name,
                expression,
            } => Self::AddCheckConstraint {
                schema: schema.clone(),
                table: table.clone(),
                name: name.clone(),
                expression: expression.clone(),
            },
        }
    }

    /// Whether the operation can be reversed. All current operations retain
    /// enough state to reverse; kept for parity with the host tool's
    /// operation contract.
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        true
    }

    /// The upgrade DDL for this operation.
    pub fn to_sql(&self) -> Result<Vec<String>> {
        match self {
            Self::Create { entity } => Ok(entity.to_sql_statement_create()),
            Self::Drop { entity } => Ok(entity.to_sql_statement_drop(false)),
            Self::Replace { entity, .. } => entity.to_sql_statement_create_or_replace(),
            Self::AddCheckConstraint {
                schema,
                table,
                name,
                expression,
            } => Ok(vec![format!(
                "ALTER TABLE {}.\"{}\" ADD CONSTRAINT \"{}\" CHECK ({})",
                coerce_to_quoted(schema),
                table,
                name,
                expression,
            )]),
            Self::DropCheckConstraint {
                schema,
                table,
                name,
                ..
            } => Ok(vec![format!(
                "ALTER TABLE {}.\"{}\" DROP CONSTRAINT \"{}\"",
                coerce_to_quoted(schema),
                table,
                name,
            )]),
        }
    }

    /// Human-readable one-liner for logs and plan output.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Create { entity } => format!("create {}", entity.identity()),
            Self::Drop { entity } => format!("drop {}", entity.identity()),
            Self::Replace { entity, .. } => format!("replace {}", entity.identity()),
            Self::AddCheckConstraint {
                schema, table, name, ..
            } => format!("add check constraint {name} on {schema}.{table}"),
            Self::DropCheckConstraint {
                schema, table, name, ..
            } => format!("drop check constraint {name} on {schema}.{table}"),
        }
    }

    /// Renders Rust source for a revision file: the entity reconstruction
    /// followed by the op call.
    #[must_use]
    pub fn render_for_migration(&self) -> String {
        match self {
            Self::Create { entity } => format!(
                "{}op.create_entity(&{});\n",
                entity.render_self_for_migration(),
                entity.to_variable_name(),
            ),
            Self::Drop { entity } => format!(
                "{}op.drop_entity(&{});\n",
                entity.render_self_for_migration(),
                entity.to_variable_name(),
            ),
            Self::Replace { entity, .. } => format!(
                "{}op.replace_entity(&{});\n",
                entity.render_self_for_migration(),
                entity.to_variable_name(),
            ),
            Self::AddCheckConstraint {
                schema,
                table,
                name,
                expression,
            } => format!(
                "op.add_check_constraint(\"{schema}\", \"{table}\", \"{name}\", r#\"{expression}\"#);\n",
            ),
            Self::DropCheckConstraint {
                schema, table, name, ..
            } => format!("op.drop_check_constraint(\"{schema}\", \"{table}\", \"{name}\");\n"),
        }
    }

    /// The entity this operation concerns, when it concerns one.
    #[must_use]
    pub fn entity(&self) -> Option<&ReplaceableEntity> {
        match self {
            Self::Create { entity } | Self::Drop { entity } | Self::Replace { entity, .. } => {
                Some(entity)
            }
            _ => None,
        }
    }

    /// Whether this operation creates or updates an entity. Operations of
    /// this class seed later simulations as dependencies.
    #[must_use]
    pub fn has_create_or_update(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Replace { .. })
    }
}
