//! Empirical dependency resolution.
//!
//! Rather than asking callers to declare a dependency graph, the resolver
//! discovers edges from the database's own referential errors: it repeatedly
//! tries to create the not-yet-ordered entities inside rolled-back
//! simulations seeded with the already-ordered prefix. An entity whose
//! creation the database refuses simply waits for a later pass. Worst case
//! is quadratic in the number of entities, which is acceptable at the scale
//! entities are declared.

use pgdrift_core::ReplaceableEntity;
use sqlx::PgConnection;
use tracing::debug;

use crate::error::{DriftError, Result};
use crate::simulate::Simulation;

/// Orders `entities` so that creating them in sequence inside one
/// transaction raises no referential errors.
///
/// Fails with [`DriftError::UnresolvableDependency`] when a full pass makes
/// no progress, naming the stuck entities; that means a cyclic or externally
/// unsatisfiable reference, never silently mis-ordered output.
pub async fn solve_resolution_order(
    conn: &mut PgConnection,
    entities: &[ReplaceableEntity],
) -> Result<Vec<ReplaceableEntity>> {
    let mut ordered: Vec<ReplaceableEntity> = Vec::with_capacity(entities.len());
    let mut remaining: Vec<ReplaceableEntity> = entities.to_vec();

    while !remaining.is_empty() {
        let resolved_before_pass = ordered.len();
        let mut deferred: Vec<ReplaceableEntity> = Vec::new();
        for entity in remaining {
            match Simulation::begin(&mut *conn, &entity, &ordered).await {
                Ok(simulation) => {
                    simulation.rollback().await?;
                    debug!(entity = %entity.identity(), position = ordered.len(), "resolved");
                    ordered.push(entity);
                }
                Err(DriftError::Database(err)) => {
                    debug!(entity = %entity.identity(), error = %err, "deferred to a later pass");
                    deferred.push(entity);
                }
                Err(other) => return Err(other),
            }
        }
        if ordered.len() == resolved_before_pass && !deferred.is_empty() {
            return Err(DriftError::UnresolvableDependency {
                identities: deferred
                    .iter()
                    .map(ReplaceableEntity::identity)
                    .collect(),
            });
        }
        remaining = deferred;
    }

    Ok(ordered)
}
