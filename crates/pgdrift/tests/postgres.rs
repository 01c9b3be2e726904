//! Live-database scenarios.
//!
//! These tests need a PostgreSQL server; they are ignored by default and run
//! with `DATABASE_URL=postgres://.. cargo test -- --ignored`. Every test
//! wraps its work in a transaction that is rolled back, so the target
//! database is left exactly as it was found.

use pgdrift::prelude::*;
use sqlx::{Connection, Executor, PgConnection};

async fn connect() -> PgConnection {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for live tests");
    PgConnection::connect(&url).await.expect("connect")
}

/// Operations in `ops` that concern the entity with this identity.
fn ops_for<'a>(
    ops: &'a [MigrationOperation],
    identity: &str,
) -> Vec<&'a MigrationOperation> {
    ops.iter()
        .filter(|op| {
            op.entity()
                .map(ReplaceableEntity::identity)
                .as_deref()
                == Some(identity)
        })
        .collect()
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL server"]
async fn function_lifecycle_create_noop_recreate() {
    let mut conn = connect().await;
    let mut tx = conn.begin().await.unwrap();

    let function = ReplaceableEntity::from_sql(
        "create function public.to_upper(some_text text) returns text as $$ \
         select upper(some_text) $$ language sql",
    )
    .unwrap();
    let identity = function.identity();

    let mut registry = EntityRegistry::new();
    registry.register([function.clone()]);
    let metadata = SchemaMetadata::new();
    let options = DiffOptions::default();

    // Not in the database yet: one create.
    let ops = compare_registered_entities(&mut tx, &registry, &metadata, &options)
        .await
        .unwrap();
    let ours = ops_for(&ops, &identity);
    assert_eq!(ours.len(), 1);
    assert!(matches!(ours[0], MigrationOperation::Create { .. }));

    // Apply the create; the diff settles to a no-op.
    for statement in ours[0].to_sql().unwrap() {
        (&mut *tx).execute(statement.as_str()).await.unwrap();
    }
    let ops = compare_registered_entities(&mut tx, &registry, &metadata, &options)
        .await
        .unwrap();
    assert!(ops_for(&ops, &identity).is_empty());

    // Drop it behind the tool's back: the create comes back.
    for statement in function.to_sql_statement_drop(false) {
        (&mut *tx).execute(statement.as_str()).await.unwrap();
    }
    let ops = compare_registered_entities(&mut tx, &registry, &metadata, &options)
        .await
        .unwrap();
    let ours = ops_for(&ops, &identity);
    assert_eq!(ours.len(), 1);
    assert!(matches!(ours[0], MigrationOperation::Create { .. }));

    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL server"]
async fn changed_view_definition_is_a_replace() {
    let mut conn = connect().await;
    let mut tx = conn.begin().await.unwrap();

    (&mut *tx)
        .execute("create view public.drift_v as select 1 as n")
        .await
        .unwrap();

    let desired =
        ReplaceableEntity::from_sql("create view public.drift_v as select 2 as n").unwrap();
    let mut registry = EntityRegistry::new();
    registry.register([desired.clone()]);

    let ops = compare_registered_entities(
        &mut tx,
        &registry,
        &SchemaMetadata::new(),
        &DiffOptions::default(),
    )
    .await
    .unwrap();
    let ours = ops_for(&ops, &desired.identity());
    assert_eq!(ours.len(), 1);
    match ours[0] {
        MigrationOperation::Replace { previous, .. } => {
            assert!(previous.normalized_definition().contains('1'));
        }
        other => panic!("expected a replace, got {}", other.description()),
    }

    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL server"]
async fn resolution_order_puts_dependencies_first() {
    let mut conn = connect().await;
    let mut tx = conn.begin().await.unwrap();

    let base = ReplaceableEntity::from_sql("create view public.dep_a as select 1 as n").unwrap();
    let dependent =
        ReplaceableEntity::from_sql("create view public.dep_b as select n from public.dep_a")
            .unwrap();

    // Passed in the wrong order on purpose.
    let ordered = solve_resolution_order(&mut tx, &[dependent.clone(), base.clone()])
        .await
        .unwrap();
    let identities: Vec<String> = ordered.iter().map(ReplaceableEntity::identity).collect();
    assert_eq!(identities, vec![base.identity(), dependent.identity()]);

    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL server"]
async fn database_rendering_matches_identity() {
    let mut conn = connect().await;
    let mut tx = conn.begin().await.unwrap();

    let view =
        ReplaceableEntity::from_sql("create view public.gdd_v as select 1 as num").unwrap();
    let rendered = get_database_definition(&mut tx, &view, &[]).await.unwrap();

    assert_eq!(rendered.identity(), view.identity());
    // PostgreSQL canonicalizes the body; the column must survive.
    assert!(rendered.normalized_definition().contains("num"));

    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL server"]
async fn recreate_dropped_heals_collateral_drops() {
    let mut conn = connect().await;
    let mut tx = conn.begin().await.unwrap();

    (&mut *tx)
        .execute("create table public.rd_base (id int)")
        .await
        .unwrap();
    (&mut *tx)
        .execute("create materialized view public.rd_root as select id from public.rd_base")
        .await
        .unwrap();
    (&mut *tx)
        .execute("create view public.rd_leaf as select id from public.rd_root")
        .await
        .unwrap();

    // A plain drop is blocked by the dependent view.
    {
        let mut savepoint = tx.begin().await.unwrap();
        let refused = (&mut *savepoint)
            .execute("drop materialized view public.rd_root")
            .await;
        assert!(refused.is_err());
        savepoint.rollback().await.unwrap();
    }

    // Inside a recreate-dropped scope the cascade is healed.
    let mut scope = RecreateDropped::begin(&mut tx).await.unwrap();
    scope
        .connection()
        .execute("drop materialized view public.rd_root cascade")
        .await
        .unwrap();
    scope
        .connection()
        .execute("create materialized view public.rd_root as select id, id * 2 as double_id from public.rd_base")
        .await
        .unwrap();
    scope.finish().await.unwrap();

    let views = reflect_entities(&mut tx, EntityKind::View, "public")
        .await
        .unwrap();
    assert!(views
        .iter()
        .any(|entity| entity.identity() == "view: public.rd_leaf"));

    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL server"]
async fn brand_new_entity_in_recreate_scope_is_refused() {
    let mut conn = connect().await;
    let mut tx = conn.begin().await.unwrap();

    let mut scope = RecreateDropped::begin(&mut tx).await.unwrap();
    scope
        .connection()
        .execute("create view public.surprise_v as select 1 as n")
        .await
        .unwrap();
    let err = scope.finish().await.unwrap_err();
    assert!(matches!(err, DriftError::UnexpectedNewEntity { .. }));

    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL server"]
async fn check_constraints_diff_both_directions() {
    let mut conn = connect().await;
    let mut tx = conn.begin().await.unwrap();

    (&mut *tx)
        .execute("create table public.cc_account (balance numeric)")
        .await
        .unwrap();
    (&mut *tx)
        .execute(
            "alter table public.cc_account \
             add constraint ck_cc_legacy check (balance < 1000000)",
        )
        .await
        .unwrap();

    let metadata = SchemaMetadata::new().table(
        TableMetadata::new("cc_account")
            .column(ColumnMetadata::new("balance", "numeric"))
            .check_constraint(CheckConstraintDef::new(
                "ck_cc_balance_positive",
                "balance >= 0",
                vec!["balance".to_string()],
            )),
    );

    let ops = compare_check_constraints(&mut tx, &metadata, &CheckConstraintScope::DefaultSchema)
        .await
        .unwrap();
    let ours: Vec<_> = ops
        .iter()
        .filter(|op| {
            matches!(
                op,
                MigrationOperation::AddCheckConstraint { table, .. }
                | MigrationOperation::DropCheckConstraint { table, .. }
                if table == "cc_account"
            )
        })
        .collect();
    assert_eq!(ours.len(), 2);
    assert!(ours.iter().any(|op| matches!(
        op,
        MigrationOperation::AddCheckConstraint { name, .. } if name == "ck_cc_balance_positive"
    )));
    assert!(ours.iter().any(|op| matches!(
        op,
        MigrationOperation::DropCheckConstraint { name, expression, .. }
            if name == "ck_cc_legacy" && expression.contains("1000000")
    )));

    tx.rollback().await.unwrap();
}
