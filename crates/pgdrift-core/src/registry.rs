//! The entity registry.
//!
//! An explicit context object collecting the entities an application declares
//! as its desired state, together with the schema and kind filters the diff
//! engine honors. Nothing here is process-global; callers own the registry
//! and hand it to the engine.

use std::collections::{BTreeMap, BTreeSet};

use crate::entity::{EntityKind, ReplaceableEntity};

/// Collects declared entities and the filters scoping a diff run.
///
/// Registration is additive and idempotent: registering the same identity
/// twice keeps the most recent entity.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: BTreeMap<String, ReplaceableEntity>,
    schemas: BTreeSet<String>,
    exclude_schemas: BTreeSet<String>,
    entity_kinds: BTreeSet<EntityKind>,
}

impl EntityRegistry {
    /// Creates an empty registry with no filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers entities, keyed by identity. Later registrations of the
    /// same identity replace earlier ones.
    pub fn register<I, E>(&mut self, entities: I)
    where
        I: IntoIterator<Item = E>,
        E: Into<ReplaceableEntity>,
    {
        for entity in entities {
            let entity = entity.into();
            self.entities.insert(entity.identity(), entity);
        }
    }

    /// Adds schemas the diff engine should observe even when no registered
    /// entity lives in them.
    pub fn add_schemas<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, schemas: I) {
        self.schemas.extend(schemas.into_iter().map(Into::into));
    }

    /// Adds schemas the diff engine must never touch.
    pub fn add_exclude_schemas<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, schemas: I) {
        self.exclude_schemas
            .extend(schemas.into_iter().map(Into::into));
    }

    /// Restricts the diff to the given entity kinds. No restriction means
    /// every kind is compared.
    pub fn add_entity_kinds<I: IntoIterator<Item = EntityKind>>(&mut self, kinds: I) {
        self.entity_kinds.extend(kinds);
    }

    /// Forgets all registered entities and filters.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.schemas.clear();
        self.exclude_schemas.clear();
        self.entity_kinds.clear();
    }

    /// Registered entities, ordered by identity.
    pub fn entities(&self) -> impl Iterator<Item = &ReplaceableEntity> {
        self.entities.values()
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entities are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks up a registered entity by identity.
    #[must_use]
    pub fn get(&self, identity: &str) -> Option<&ReplaceableEntity> {
        self.entities.get(identity)
    }

    /// Extra schemas to observe during a diff.
    #[must_use]
    pub fn schemas(&self) -> &BTreeSet<String> {
        &self.schemas
    }

    /// Schemas excluded from a diff.
    #[must_use]
    pub fn exclude_schemas(&self) -> &BTreeSet<String> {
        &self.exclude_schemas
    }

    /// Kinds the diff is restricted to; an empty restriction means all of
    /// [`EntityKind::ALL`].
    #[must_use]
    pub fn allowed_kinds(&self) -> Vec<EntityKind> {
        if self.entity_kinds.is_empty() {
            EntityKind::ALL.to_vec()
        } else {
            self.entity_kinds.iter().copied().collect()
        }
    }
}
