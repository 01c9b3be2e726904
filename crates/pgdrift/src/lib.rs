//! Drift detection for PostgreSQL replaceable entities.
//!
//! `pgdrift` compares application-declared functions, views, materialized
//! views, triggers and extensions against a live database and emits the
//! reversible migration operations that reconcile the two. It is the
//! database-bound half of the project:
//!
//! - **Reflection** - per-kind catalog queries (`pg_proc`, `pg_views`, ...)
//! - **Simulation** - savepoint sandbox answering "what will the database
//!   store for this entity", always rolled back
//! - **Dependency resolver** - empirical creation-order discovery
//! - **Diff engine** - create/replace/drop decisions per declared entity
//! - **Check-constraint comparator** - `(table, name)` set difference
//!
//! The pure model (entities, registry, operations) lives in
//! [`pgdrift_core`].
//!
//! # Example
//!
//! ```rust,ignore
//! use pgdrift::prelude::*;
//!
//! let mut registry = EntityRegistry::new();
//! registry.register([ReplaceableEntity::from_sql(
//!     "create view public.active_users as select id from account where active",
//! )?]);
//!
//! let mut conn = PgConnection::connect(&database_url).await?;
//! let ops = compare_registered_entities(
//!     &mut conn,
//!     &registry,
//!     &SchemaMetadata::new(),
//!     &DiffOptions::default(),
//! )
//! .await?;
//! for op in &ops {
//!     println!("{}", op.description());
//! }
//! ```

pub mod check_constraints;
pub mod depends;
pub mod diff;
pub mod error;
pub mod reflect;
pub mod simulate;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::check_constraints::{compare_check_constraints, CheckConstraintScope};
    pub use crate::depends::solve_resolution_order;
    pub use crate::diff::{compare_registered_entities, DiffOptions};
    pub use crate::error::{DriftError, Result};
    pub use crate::reflect::{reflect_entities, reflect_schemas};
    pub use crate::simulate::{get_database_definition, RecreateDropped, Simulation};
    pub use pgdrift_core::{
        CheckConstraintDef, ColumnMetadata, EntityKind, EntityRegistry, MigrationOperation,
        ReplaceableEntity, SchemaMetadata, TableMetadata,
    };
}

pub use check_constraints::CheckConstraintScope;
pub use diff::{compare_registered_entities, DiffOptions};
pub use error::{DriftError, Result};
pub use simulate::{get_database_definition, RecreateDropped, Simulation};
