//! Engine error taxonomy.

use pgdrift_core::EntityError;

/// Errors raised by reflection, simulation, dependency resolution and
/// diffing.
///
/// Database errors raised inside a simulated create are interpreted only by
/// the dependency resolver (create failure means "not yet satisfiable");
/// everywhere else they propagate unchanged as [`DriftError::Database`].
#[derive(Debug, thiserror::Error)]
pub enum DriftError {
    /// Entity model error (parse failure, unsupported operation).
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Error raised by the database driver.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// The before/after simulation snapshots showed no new entity. The
    /// target was just created inside the savepoint, so a missing delta is
    /// an internal consistency failure, not a user error.
    #[error("simulation of {identity} produced no snapshot delta; this is a bug")]
    Unreachable {
        /// Identity of the entity being simulated.
        identity: String,
    },

    /// A full resolver pass created nothing; the remaining entities have
    /// cyclic or unsatisfiable dependencies.
    #[error("could not resolve a creation order for: {}", identities.join(", "))]
    UnresolvableDependency {
        /// Identities of the stuck entities.
        identities: Vec<String>,
    },

    /// An entity appeared during a recreate-dropped scope that did not
    /// exist when the scope opened. Only drops can be healed; creations
    /// must go through a migration.
    #[error("entity {identity} was created inside a recreate-dropped scope")]
    UnexpectedNewEntity {
        /// Identity of the new entity.
        identity: String,
    },

    /// A declared check constraint has no name, so it cannot be tracked
    /// against the database. Raised during collection, before any database
    /// interaction.
    #[error("table {schema}.{table} declares a check constraint without a name")]
    UnnamedConstraint {
        /// Schema of the owning table.
        schema: String,
        /// Owning table name.
        table: String,
    },

    /// A declared check constraint references columns that exist on no
    /// declared table at all.
    #[error(
        "check constraint {name} on {schema}.{table} references unknown columns: {}",
        columns.join(", ")
    )]
    DanglingColumnReference {
        /// Schema of the owning table.
        schema: String,
        /// Owning table name.
        table: String,
        /// Constraint name.
        name: String,
        /// The columns found nowhere in the metadata.
        columns: Vec<String>,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, DriftError>;
