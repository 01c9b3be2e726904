//! The replaceable-entity model.
//!
//! A replaceable entity is a database object whose full definition can be
//! diffed and recreated wholesale: functions, views, materialized views,
//! triggers and extensions. The supported kinds form a closed set; the diff
//! engine and dependency resolver only ever talk to [`ReplaceableEntity`],
//! never to a concrete kind.

mod extension;
mod function;
mod materialized_view;
mod trigger;
mod view;

pub use extension::PgExtension;
pub use function::PgFunction;
pub use materialized_view::PgMaterializedView;
pub use trigger::PgTrigger;
pub use view::PgView;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EntityError, Result};
use crate::statement::{coerce_to_quoted, normalize_whitespace};

/// The closed set of supported entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A SQL or procedural-language function.
    Function,
    /// A regular view.
    View,
    /// A materialized view.
    MaterializedView,
    /// A trigger on a table or view.
    Trigger,
    /// A PostgreSQL extension.
    Extension,
}

impl EntityKind {
    /// Every kind the engine knows about, in the order entity SQL is
    /// matched against the kinds' parse templates.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Function,
        EntityKind::MaterializedView,
        EntityKind::View,
        EntityKind::Trigger,
        EntityKind::Extension,
    ];

    /// Stable lowercase tag, used in identities and name filters.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::View => "view",
            Self::MaterializedView => "materialized_view",
            Self::Trigger => "trigger",
            Self::Extension => "extension",
        }
    }

    /// The Rust type implementing this kind, for rendered import statements.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Function => "PgFunction",
            Self::View => "PgView",
            Self::MaterializedView => "PgMaterializedView",
            Self::Trigger => "PgTrigger",
            Self::Extension => "PgExtension",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A database object that can be diffed and recreated wholesale.
///
/// Entities are immutable value objects: fields are normalized on
/// construction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplaceableEntity {
    /// See [`PgFunction`].
    Function(PgFunction),
    /// See [`PgView`].
    View(PgView),
    /// See [`PgMaterializedView`].
    MaterializedView(PgMaterializedView),
    /// See [`PgTrigger`].
    Trigger(PgTrigger),
    /// See [`PgExtension`].
    Extension(PgExtension),
}

impl ReplaceableEntity {
    /// Parses entity creation SQL, inferring the kind by trying each kind's
    /// templates in [`EntityKind::ALL`] order.
    pub fn from_sql(sql: &str) -> Result<Self> {
        for kind in EntityKind::ALL {
            if let Ok(entity) = Self::from_sql_for_kind(kind, sql) {
                return Ok(entity);
            }
        }
        Err(EntityError::ParseFailure {
            kind: "replaceable entity",
            sql: sql.to_string(),
        })
    }

    /// Reads a `.sql` file and parses its contents, inferring the kind.
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let sql = std::fs::read_to_string(path).map_err(|source| EntityError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_sql(&sql)
    }

    /// Parses entity creation SQL for a specific kind.
    pub fn from_sql_for_kind(kind: EntityKind, sql: &str) -> Result<Self> {
        match kind {
            EntityKind::Function => PgFunction::from_sql(sql).map(Self::Function),
            EntityKind::View => PgView::from_sql(sql).map(Self::View),
            EntityKind::MaterializedView => {
                PgMaterializedView::from_sql(sql).map(Self::MaterializedView)
            }
            EntityKind::Trigger => PgTrigger::from_sql(sql).map(Self::Trigger),
            EntityKind::Extension => PgExtension::from_sql(sql).map(Self::Extension),
        }
    }

    /// Returns this entity's kind tag.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Function(_) => EntityKind::Function,
            Self::View(_) => EntityKind::View,
            Self::MaterializedView(_) => EntityKind::MaterializedView,
            Self::Trigger(_) => EntityKind::Trigger,
            Self::Extension(_) => EntityKind::Extension,
        }
    }

    /// The schema the entity lives in (unquoted).
    #[must_use]
    pub fn schema(&self) -> &str {
        match self {
            Self::Function(e) => e.schema(),
            Self::View(e) => e.schema(),
            Self::MaterializedView(e) => e.schema(),
            Self::Trigger(e) => e.schema(),
            Self::Extension(e) => e.schema(),
        }
    }

    /// The entity's call/name signature (unquoted).
    #[must_use]
    pub fn signature(&self) -> &str {
        match self {
            Self::Function(e) => e.signature(),
            Self::View(e) => e.signature(),
            Self::MaterializedView(e) => e.signature(),
            Self::Trigger(e) => e.signature(),
            Self::Extension(e) => e.signature(),
        }
    }

    /// The normalized definition body. Extensions synthesize one from their
    /// name and schema; every other kind stores the parsed SQL body.
    #[must_use]
    pub fn definition(&self) -> String {
        match self {
            Self::Function(e) => e.definition().to_string(),
            Self::View(e) => e.definition().to_string(),
            Self::MaterializedView(e) => e.definition().to_string(),
            Self::Trigger(e) => e.definition().to_string(),
            Self::Extension(e) => e.definition(),
        }
    }

    /// Definition with whitespace collapsed, the form used for comparison.
    #[must_use]
    pub fn normalized_definition(&self) -> String {
        normalize_whitespace(&self.definition())
    }

    /// A string that consistently and globally identifies this entity.
    ///
    /// Extensions can only exist once per database, so their schema is not
    /// part of the identity. Trigger names are only unique per table, so a
    /// trigger's identity includes its owning relation.
    #[must_use]
    pub fn identity(&self) -> String {
        match self {
            Self::Extension(e) => format!("{}: {}", self.kind(), e.signature()),
            Self::Trigger(e) => format!(
                "{}: {}.{} {}",
                self.kind(),
                e.schema(),
                e.signature(),
                e.on_entity()
            ),
            _ => format!("{}: {}.{}", self.kind(), self.schema(), self.signature()),
        }
    }

    /// The schema wrapped in literal quotes, for emitting DDL.
    #[must_use]
    pub fn literal_schema(&self) -> String {
        coerce_to_quoted(self.schema())
    }

    /// DDL statement(s) creating the object fresh.
    #[must_use]
    pub fn to_sql_statement_create(&self) -> Vec<String> {
        match self {
            Self::Function(e) => e.to_sql_statement_create(),
            Self::View(e) => e.to_sql_statement_create(),
            Self::MaterializedView(e) => e.to_sql_statement_create(),
            Self::Trigger(e) => e.to_sql_statement_create(),
            Self::Extension(e) => e.to_sql_statement_create(),
        }
    }

    /// DDL statement(s) removing the object; `cascade` forcibly drops
    /// dependent objects too.
    #[must_use]
    pub fn to_sql_statement_drop(&self, cascade: bool) -> Vec<String> {
        match self {
            Self::Function(e) => e.to_sql_statement_drop(cascade),
            Self::View(e) => e.to_sql_statement_drop(cascade),
            Self::MaterializedView(e) => e.to_sql_statement_drop(cascade),
            Self::Trigger(e) => e.to_sql_statement_drop(cascade),
            Self::Extension(e) => e.to_sql_statement_drop(cascade),
        }
    }

    /// DDL statement(s) achieving an atomic-as-possible replace.
    ///
    /// Kinds without a native `CREATE OR REPLACE` decompose into
    /// drop-then-create; extensions fail with
    /// [`EntityError::NotSupported`].
    pub fn to_sql_statement_create_or_replace(&self) -> Result<Vec<String>> {
        match self {
            Self::Function(e) => Ok(e.to_sql_statement_create_or_replace()),
            Self::View(e) => Ok(e.to_sql_statement_create_or_replace()),
            Self::MaterializedView(e) => Ok(e.to_sql_statement_create_or_replace()),
            Self::Trigger(e) => Ok(e.to_sql_statement_create_or_replace()),
            Self::Extension(e) => e.to_sql_statement_create_or_replace(),
        }
    }

    /// Renders Rust source that reconstructs this instance in a revision
    /// file.
    #[must_use]
    pub fn render_self_for_migration(&self) -> String {
        match self {
            Self::Function(e) => e.render_self_for_migration(),
            Self::View(e) => e.render_self_for_migration(),
            Self::MaterializedView(e) => e.render_self_for_migration(),
            Self::Trigger(e) => e.render_self_for_migration(),
            Self::Extension(e) => e.render_self_for_migration(),
        }
    }

    /// Renders the import line a revision file needs for this entity.
    #[must_use]
    pub fn render_import_statement(&self) -> String {
        format!("use pgdrift_core::{};", self.kind().type_name())
    }

    /// A deterministic variable name derived from the entity's identity.
    #[must_use]
    pub fn to_variable_name(&self) -> String {
        variable_name(self.schema(), self.signature())
    }
}

/// Deterministic snake_case variable name for rendered revision source.
pub(crate) fn variable_name(schema: &str, signature: &str) -> String {
    let object_name = signature
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
        .replace('-', "_");
    format!("{}_{}", schema.to_lowercase(), object_name)
}

impl fmt::Display for ReplaceableEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}

impl From<PgFunction> for ReplaceableEntity {
    fn from(e: PgFunction) -> Self {
        Self::Function(e)
    }
}

impl From<PgView> for ReplaceableEntity {
    fn from(e: PgView) -> Self {
        Self::View(e)
    }
}

impl From<PgMaterializedView> for ReplaceableEntity {
    fn from(e: PgMaterializedView) -> Self {
        Self::MaterializedView(e)
    }
}

impl From<PgTrigger> for ReplaceableEntity {
    fn from(e: PgTrigger) -> Self {
        Self::Trigger(e)
    }
}

impl From<PgExtension> for ReplaceableEntity {
    fn from(e: PgExtension) -> Self {
        Self::Extension(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_sql_infers_the_kind() {
        let view = ReplaceableEntity::from_sql("create view public.a as select 1").unwrap();
        assert_eq!(view.kind(), EntityKind::View);

        let matview = ReplaceableEntity::from_sql(
            "create materialized view public.b as select 1 with no data",
        )
        .unwrap();
        assert_eq!(matview.kind(), EntityKind::MaterializedView);

        let ext = ReplaceableEntity::from_sql("create extension pg_trgm with schema public")
            .unwrap();
        assert_eq!(ext.kind(), EntityKind::Extension);
    }

    #[test]
    fn from_sql_rejects_unparseable_text() {
        let err = ReplaceableEntity::from_sql("alter table t add column x int").unwrap_err();
        assert!(matches!(err, EntityError::ParseFailure { .. }));
    }

    #[test]
    fn identity_excludes_schema_for_extensions() {
        let ext = PgExtension::new("public", "citext");
        let identity = ReplaceableEntity::from(ext).identity();
        assert_eq!(identity, "extension: citext");
    }

    #[test]
    fn variable_name_is_deterministic() {
        let entity = ReplaceableEntity::from_sql(
            "create view public.Active_Users as select 1",
        )
        .unwrap();
        assert_eq!(entity.to_variable_name(), "public_active_users");
    }
}
