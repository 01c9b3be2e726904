//! The simulation sandbox.
//!
//! Everything the diff engine wants to know about "what would the database
//! do with this entity" is answered by creating the entity inside a nested
//! transaction (savepoint) that is always rolled back. The live database is
//! never changed by a simulation, success or failure.

use std::collections::BTreeSet;

use pgdrift_core::{EntityError, EntityKind, ReplaceableEntity};
use sqlx::{Connection, Executor, PgConnection, Postgres, Transaction};
use tracing::debug;

use crate::depends::solve_resolution_order;
use crate::error::{DriftError, Result};
use crate::reflect::reflect_entities;

/// A savepoint with an entity and its dependencies created inside it.
///
/// Dropping the guard rolls the savepoint back; [`Simulation::rollback`]
/// does the same but lets the caller observe rollback errors.
pub struct Simulation<'c> {
    tx: Transaction<'c, Postgres>,
}

impl<'c> Simulation<'c> {
    /// Opens a savepoint and creates `dependencies` (in order) followed by
    /// `entity` inside it. On any failure the savepoint is rolled back
    /// before the error propagates.
    pub async fn begin(
        conn: &'c mut PgConnection,
        entity: &ReplaceableEntity,
        dependencies: &[ReplaceableEntity],
    ) -> Result<Simulation<'c>> {
        let mut tx = conn.begin().await?;
        for dependency in dependencies {
            if let Err(err) = install(&mut tx, dependency).await {
                tx.rollback().await?;
                return Err(err);
            }
        }
        if let Err(err) = install(&mut tx, entity).await {
            tx.rollback().await?;
            return Err(err);
        }
        Ok(Self { tx })
    }

    /// The connection, still inside the savepoint. Statements run here are
    /// discarded on rollback.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Rolls the savepoint back explicitly.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Creates one entity on the connection, replacing any existing version.
///
/// The first attempt is the kind's native `create or replace`, tried in its
/// own savepoint. When the kind has no native replace, or the database
/// refuses it (e.g. a view whose column list changed), fall back to
/// drop-cascade followed by a fresh create.
async fn install(conn: &mut PgConnection, entity: &ReplaceableEntity) -> Result<()> {
    match entity.to_sql_statement_create_or_replace() {
        Ok(statements) => {
            let mut savepoint = conn.begin().await?;
            match execute_all(&mut savepoint, &statements).await {
                Ok(()) => {
                    savepoint.commit().await?;
                    return Ok(());
                }
                Err(err) => {
                    debug!(entity = %entity.identity(), error = %err, "replace refused, recreating");
                    savepoint.rollback().await?;
                }
            }
        }
        Err(EntityError::NotSupported { .. }) => {}
        Err(other) => return Err(other.into()),
    }

    // The drop may legitimately fail when the entity does not exist yet.
    let mut savepoint = conn.begin().await?;
    match execute_all(&mut savepoint, &entity.to_sql_statement_drop(true)).await {
        Ok(()) => savepoint.commit().await?,
        Err(_) => savepoint.rollback().await?,
    }

    let mut savepoint = conn.begin().await?;
    match execute_all(&mut savepoint, &entity.to_sql_statement_create()).await {
        Ok(()) => {
            savepoint.commit().await?;
            Ok(())
        }
        Err(err) => {
            savepoint.rollback().await?;
            Err(err.into())
        }
    }
}

async fn execute_all(conn: &mut PgConnection, statements: &[String]) -> sqlx::Result<()> {
    for statement in statements {
        (&mut *conn).execute(statement.as_str()).await?;
    }
    Ok(())
}

/// Obtains the database's own rendering of `entity`.
///
/// PostgreSQL canonicalizes definitions on create (whitespace, case,
/// qualification), so the declared text and the stored text are not required
/// to match. Two rolled-back simulations answer what the stored text is:
/// one with the entity created then dropped (the "before" snapshot) and one
/// with it created (the "after" snapshot). Both snapshots are sorted by
/// identity; the first position where they disagree is the entity the
/// second simulation added.
pub async fn get_database_definition(
    conn: &mut PgConnection,
    entity: &ReplaceableEntity,
    dependencies: &[ReplaceableEntity],
) -> Result<ReplaceableEntity> {
    let kind = entity.kind();
    let schema_pattern = entity.schema().to_string();

    let mut sim = Simulation::begin(&mut *conn, entity, dependencies).await?;
    execute_all(sim.connection(), &entity.to_sql_statement_drop(false))
        .await
        .map_err(DriftError::from)?;
    let mut before = reflect_entities(sim.connection(), kind, &schema_pattern).await?;
    sim.rollback().await?;

    let mut sim = Simulation::begin(&mut *conn, entity, dependencies).await?;
    let mut after = reflect_entities(sim.connection(), kind, &schema_pattern).await?;
    sim.rollback().await?;

    before.sort_by_key(ReplaceableEntity::identity);
    after.sort_by_key(ReplaceableEntity::identity);
    for (index, rendered) in after.iter().enumerate() {
        let matched = before
            .get(index)
            .is_some_and(|existing| existing.identity() == rendered.identity());
        if !matched {
            return Ok(rendered.clone());
        }
    }
    Err(DriftError::Unreachable {
        identity: entity.identity(),
    })
}

/// Snapshot of every user entity of every kind.
async fn snapshot_all(conn: &mut PgConnection) -> Result<Vec<ReplaceableEntity>> {
    let mut entities = Vec::new();
    for kind in EntityKind::ALL {
        entities.extend(reflect_entities(&mut *conn, kind, "%").await?);
    }
    Ok(entities)
}

/// A transaction scope that heals collateral drops.
///
/// Dropping an entity with `CASCADE` can silently take dependent views,
/// triggers and functions with it. This guard snapshots every entity before
/// handing the connection to the caller; [`RecreateDropped::finish`]
/// recreates everything that disappeared, in resolved dependency order, and
/// commits. Abandoning the guard rolls the whole scope back.
pub struct RecreateDropped<'c> {
    tx: Transaction<'c, Postgres>,
    before: Vec<ReplaceableEntity>,
}

impl<'c> RecreateDropped<'c> {
    /// Opens the scope and snapshots the current entities.
    pub async fn begin(conn: &'c mut PgConnection) -> Result<RecreateDropped<'c>> {
        let mut tx = conn.begin().await?;
        let before = snapshot_all(&mut tx).await?;
        Ok(Self { tx, before })
    }

    /// The connection inside the scope; run the destructive DDL here.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Recreates every entity dropped inside the scope and commits.
    ///
    /// An entity that exists now but did not exist at [`begin`] is refused
    /// with [`DriftError::UnexpectedNewEntity`]: only drops can be healed,
    /// creations must go through a migration.
    ///
    /// [`begin`]: RecreateDropped::begin
    pub async fn finish(mut self) -> Result<()> {
        let after = snapshot_all(&mut self.tx).await?;
        let before_identities: BTreeSet<String> =
            self.before.iter().map(ReplaceableEntity::identity).collect();
        let after_identities: BTreeSet<String> =
            after.iter().map(ReplaceableEntity::identity).collect();

        if let Some(new_entity) = after
            .iter()
            .find(|entity| !before_identities.contains(&entity.identity()))
        {
            let identity = new_entity.identity();
            self.tx.rollback().await?;
            return Err(DriftError::UnexpectedNewEntity { identity });
        }

        let dropped: Vec<ReplaceableEntity> = self
            .before
            .iter()
            .filter(|entity| !after_identities.contains(&entity.identity()))
            .cloned()
            .collect();

        if !dropped.is_empty() {
            let ordered = solve_resolution_order(&mut self.tx, &dropped).await?;
            for entity in &ordered {
                debug!(entity = %entity.identity(), "recreating collaterally dropped entity");
                if let Err(err) = execute_all(&mut self.tx, &entity.to_sql_statement_create()).await
                {
                    self.tx.rollback().await?;
                    return Err(err.into());
                }
            }
        }

        self.tx.commit().await?;
        Ok(())
    }

    /// Abandons the scope, rolling back the caller's DDL too.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
