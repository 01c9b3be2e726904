//! The diff engine.
//!
//! Compares a registry of declared entities against a live database and
//! produces the migration operations that would bring the database in line.
//! Declared entities are processed in resolved dependency order for the
//! create/replace pass; only after every create/replace decision is made
//! are drops computed, so a drop decision always sees the final intended
//! state of the surviving entities.

use std::collections::BTreeSet;

use pgdrift_core::{
    EntityRegistry, MigrationOperation, ReplaceableEntity, SchemaMetadata,
};
use sqlx::PgConnection;
use tracing::{debug, info};

use crate::check_constraints::{compare_check_constraints, CheckConstraintScope};
use crate::depends::solve_resolution_order;
use crate::error::Result;
use crate::reflect::{is_system_schema, reflect_entities, reflect_schemas};
use crate::simulate::get_database_definition;

/// Predicate over full entities; applied to declared and reflected objects
/// alike.
pub type ObjectFilter = Box<dyn Fn(&ReplaceableEntity) -> bool + Send + Sync>;

/// Predicate over object names; applied to reflected objects only, matching
/// the host-tool convention that name filters never see local state.
pub type NameFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Options scoping a diff run. The library surface takes this explicitly;
/// there is no global configuration.
#[derive(Default)]
pub struct DiffOptions {
    /// Observe every non-system schema in the database, not only the
    /// schemas named by the registry and metadata.
    pub include_schemas: bool,
    /// Check-constraint comparison scope; disabled unless opted in.
    pub check_constraints: CheckConstraintScope,
    /// Keep only entities this predicate accepts.
    pub object_filter: Option<ObjectFilter>,
    /// Keep only reflected entities whose signature this predicate accepts.
    pub name_filter: Option<NameFilter>,
}

impl DiffOptions {
    fn accepts_object(&self, entity: &ReplaceableEntity) -> bool {
        self.object_filter
            .as_ref()
            .is_none_or(|filter| filter(entity))
    }

    fn accepts_reflected(&self, entity: &ReplaceableEntity) -> bool {
        self.accepts_object(entity)
            && self
                .name_filter
                .as_ref()
                .is_none_or(|filter| filter(entity.signature()))
    }
}

/// The schemas a diff run looks at: reflected schemas (opt-in), registry
/// schemas, the schemas of registered entities and declared tables; minus
/// excluded and system schemas.
async fn observed_schemas(
    conn: &mut PgConnection,
    registry: &EntityRegistry,
    metadata: &SchemaMetadata,
    options: &DiffOptions,
) -> Result<BTreeSet<String>> {
    let mut schemas = BTreeSet::new();
    if options.include_schemas {
        schemas.extend(reflect_schemas(conn).await?);
    }
    schemas.extend(registry.schemas().iter().cloned());
    for entity in registry.entities() {
        schemas.insert(entity.schema().to_string());
    }
    schemas.extend(metadata.schemas().iter().map(ToString::to_string));
    schemas.retain(|schema| {
        !registry.exclude_schemas().contains(schema) && !is_system_schema(schema)
    });
    Ok(schemas)
}

/// Declared entities participating in the create/replace pass.
///
/// Schema exclusion scopes the drop scan only: an explicitly registered
/// entity is always monitored, even when its schema is excluded or not
/// observed. Only the kind restriction and the object filter apply here.
fn declared_entities(registry: &EntityRegistry, options: &DiffOptions) -> Vec<ReplaceableEntity> {
    let allowed_kinds = registry.allowed_kinds();
    registry
        .entities()
        .filter(|entity| allowed_kinds.contains(&entity.kind()))
        .filter(|entity| {
            let kept = options.accepts_object(entity);
            if !kept {
                debug!(entity = %entity.identity(), "declared entity excluded by object filter");
            }
            kept
        })
        .cloned()
        .collect()
}

/// Decides which operation, if any, one declared entity needs.
///
/// `rendered` is the database's own rendering of the declared entity
/// (obtained through simulation); `reflected` are the live entities of the
/// same kind and schema. Pure, so the decision table is testable without a
/// database.
#[must_use]
pub fn decide_entity_operation(
    declared: &ReplaceableEntity,
    rendered: &ReplaceableEntity,
    reflected: &[ReplaceableEntity],
) -> Option<MigrationOperation> {
    match reflected
        .iter()
        .find(|live| live.identity() == rendered.identity())
    {
        Some(live) if live.normalized_definition() == rendered.normalized_definition() => None,
        Some(live) => Some(MigrationOperation::Replace {
            entity: declared.clone(),
            previous: live.clone(),
        }),
        None => Some(MigrationOperation::Create {
            entity: declared.clone(),
        }),
    }
}

/// Compares every registered entity (and, when enabled, every declared
/// check constraint) against the database and returns the operations that
/// reconcile it.
///
/// The caller owns transaction scope: run this inside a transaction that is
/// rolled back and the database is untouched, since every simulation is a
/// savepoint that never commits.
pub async fn compare_registered_entities(
    conn: &mut PgConnection,
    registry: &EntityRegistry,
    metadata: &SchemaMetadata,
    options: &DiffOptions,
) -> Result<Vec<MigrationOperation>> {
    let observed = observed_schemas(&mut *conn, registry, metadata, options).await?;
    let allowed_kinds = registry.allowed_kinds();

    let declared = declared_entities(registry, options);

    let ordered = solve_resolution_order(&mut *conn, &declared).await?;

    let mut operations = Vec::new();
    let mut dependencies: Vec<ReplaceableEntity> = Vec::new();
    let mut settled_identities: BTreeSet<String> = BTreeSet::new();

    for entity in &ordered {
        let reflected: Vec<ReplaceableEntity> =
            reflect_entities(&mut *conn, entity.kind(), entity.schema())
                .await?
                .into_iter()
                .filter(|live| options.accepts_reflected(live))
                .collect();
        let rendered = get_database_definition(&mut *conn, entity, &dependencies).await?;
        settled_identities.insert(entity.identity());
        settled_identities.insert(rendered.identity());

        match decide_entity_operation(entity, &rendered, &reflected) {
            Some(operation) => {
                info!(op = %operation.description(), "drift detected");
                if operation.has_create_or_update() {
                    // Later simulations must see this entity's new shape,
                    // not whatever the database currently holds.
                    dependencies.push(entity.clone());
                }
                operations.push(operation);
            }
            None => debug!(entity = %entity.identity(), "in sync"),
        }
    }

    // Drop scan: anything live that no declared entity accounts for.
    for kind in &allowed_kinds {
        for schema in &observed {
            for live in reflect_entities(&mut *conn, *kind, schema).await? {
                if !options.accepts_reflected(&live) {
                    continue;
                }
                if !settled_identities.contains(&live.identity()) {
                    info!(entity = %live.identity(), "live entity not declared, dropping");
                    operations.push(MigrationOperation::Drop { entity: live });
                }
            }
        }
    }

    let constraint_operations =
        compare_check_constraints(&mut *conn, metadata, &options.check_constraints).await?;
    operations.extend(constraint_operations);

    Ok(operations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgdrift_core::PgView;

    fn view(signature: &str, body: &str) -> ReplaceableEntity {
        PgView::new("public", signature, body).into()
    }

    #[test]
    fn matching_definition_is_a_noop() {
        let declared = view("v", "select 1 as x");
        let rendered = view("v", "SELECT  1 AS x");
        let reflected = vec![view("v", "SELECT 1 AS x")];
        // Case differs between rendered and reflected only in whitespace
        // here; normalization is what makes them compare equal.
        assert_eq!(
            decide_entity_operation(&declared, &rendered, &reflected),
            None,
        );
    }

    #[test]
    fn changed_definition_is_a_replace_carrying_the_previous() {
        let declared = view("v", "select 2 as x");
        let rendered = view("v", "SELECT 2 AS x");
        let previous = view("v", "SELECT 1 AS x");
        let op = decide_entity_operation(&declared, &rendered, std::slice::from_ref(&previous));
        assert_eq!(
            op,
            Some(MigrationOperation::Replace {
                entity: declared,
                previous,
            }),
        );
    }

    #[test]
    fn unknown_identity_is_a_create() {
        let declared = view("brand_new", "select 1");
        let rendered = view("brand_new", "SELECT 1");
        let reflected = vec![view("other", "SELECT 9")];
        let op = decide_entity_operation(&declared, &rendered, &reflected);
        assert_eq!(op, Some(MigrationOperation::Create { entity: declared }));
    }

    #[test]
    fn default_options_accept_everything() {
        let options = DiffOptions::default();
        let entity = view("v", "select 1");
        assert!(options.accepts_object(&entity));
        assert!(options.accepts_reflected(&entity));
    }

    #[test]
    fn excluded_schema_does_not_remove_registered_entities() {
        let mut registry = EntityRegistry::new();
        registry.register([PgView::new("internal", "audit_v", "select 1 as x")]);
        registry.add_exclude_schemas(["internal"]);
        // Exclusion narrows the drop scan; an explicitly registered entity
        // is still monitored.
        let declared = declared_entities(&registry, &DiffOptions::default());
        assert_eq!(declared.len(), 1);
        assert_eq!(declared[0].schema(), "internal");
        assert_eq!(declared[0].signature(), "audit_v");
    }

    #[test]
    fn name_filter_applies_to_reflected_lookups_only() {
        let options = DiffOptions {
            name_filter: Some(Box::new(|name| !name.starts_with("tmp_"))),
            ..DiffOptions::default()
        };
        let scratch = view("tmp_scratch", "select 1");
        assert!(options.accepts_object(&scratch));
        assert!(!options.accepts_reflected(&scratch));
    }
}
