//! Core model for PostgreSQL replaceable-entity drift detection.
//!
//! This crate holds everything that does not touch a database: the statement
//! normalizer, the replaceable-entity model (functions, views, materialized
//! views, triggers, extensions), the entity registry, migration operations,
//! and the declarative table metadata consumed by the check-constraint
//! comparator. The database-bound engine lives in the `pgdrift` crate.
//!
//! # Example
//!
//! ```
//! use pgdrift_core::{EntityRegistry, ReplaceableEntity};
//!
//! let view = ReplaceableEntity::from_sql(
//!     "create view public.active_users as select id from account where active",
//! )?;
//! assert_eq!(view.identity(), "view: public.active_users");
//!
//! let mut registry = EntityRegistry::new();
//! registry.register([view]);
//! # Ok::<(), pgdrift_core::EntityError>(())
//! ```

pub mod entity;
pub mod error;
pub mod metadata;
pub mod operations;
pub mod registry;
pub mod statement;

pub use entity::{
    EntityKind, PgExtension, PgFunction, PgMaterializedView, PgTrigger, PgView, ReplaceableEntity,
};
pub use error::EntityError;
pub use metadata::{
    CheckConstraintDef, ColumnMetadata, SchemaMetadata, TableMetadata,
};
pub use operations::MigrationOperation;
pub use registry::EntityRegistry;
