//! Catalog reflection.
//!
//! Thin queries against the PostgreSQL system catalogs, one per entity kind,
//! all taking a SQL `LIKE` pattern over schema names bound as a parameter.
//! System schemas and extension-owned objects are excluded at the query
//! level so reflection only ever reports user-managed state.

use pgdrift_core::{EntityKind, PgExtension, PgMaterializedView, PgView, ReplaceableEntity};
use sqlx::{PgConnection, Row};

use crate::error::Result;

const SYSTEM_SCHEMAS: &[&str] = &["pg_catalog", "information_schema", "pg_toast"];

const FUNCTIONS_SQL: &str = r#"
    with extension_functions as (
        select objid from pg_depend where deptype = 'e'
    )
    select pg_get_functiondef(p.oid) as definition
    from pg_proc p
    join pg_namespace n on n.oid = p.pronamespace
    join pg_language l on l.oid = p.prolang
    left join extension_functions ef on ef.objid = p.oid
    where n.nspname like $1
      and n.nspname not in ('pg_catalog', 'information_schema', 'pg_toast')
      and ef.objid is null
      and l.lanname not in ('c', 'internal')
      and p.prokind = 'f'
    order by n.nspname, p.proname
"#;

const VIEWS_SQL: &str = r#"
    select schemaname as schema, viewname as name, definition
    from pg_views
    where schemaname like $1
      and schemaname not in ('pg_catalog', 'information_schema', 'pg_toast')
    order by schemaname, viewname
"#;

const MATVIEWS_SQL: &str = r#"
    select m.schemaname as schema, m.matviewname as name, m.definition,
           c.relispopulated as is_populated
    from pg_matviews m
    join pg_namespace n on n.nspname = m.schemaname
    join pg_class c on c.relname = m.matviewname and c.relnamespace = n.oid
    where m.schemaname like $1
      and m.schemaname not in ('pg_catalog', 'information_schema', 'pg_toast')
    order by m.schemaname, m.matviewname
"#;

const TRIGGERS_SQL: &str = r#"
    select pg_get_triggerdef(t.oid) as definition
    from pg_trigger t
    join pg_class c on c.oid = t.tgrelid
    join pg_namespace n on n.oid = c.relnamespace
    where not t.tgisinternal
      and n.nspname like $1
      and n.nspname not in ('pg_catalog', 'information_schema', 'pg_toast')
    order by n.nspname, c.relname, t.tgname
"#;

const EXTENSIONS_SQL: &str = r#"
    select n.nspname as schema, e.extname as name
    from pg_extension e
    join pg_namespace n on n.oid = e.extnamespace
    where n.nspname like $1
    order by e.extname
"#;

const SCHEMAS_SQL: &str = r#"
    select nspname as name
    from pg_namespace
    where nspname not like 'pg\_%'
      and nspname not in ('pg_catalog', 'information_schema', 'pg_toast')
    order by nspname
"#;

const CHECK_CONSTRAINTS_SQL: &str = r#"
    select n.nspname as schema, c.relname as table_name, con.conname as name,
           pg_get_constraintdef(con.oid) as definition
    from pg_constraint con
    join pg_class c on c.oid = con.conrelid
    join pg_namespace n on n.oid = c.relnamespace
    where con.contype = 'c'
      and n.nspname = $1
    order by c.relname, con.conname
"#;

/// Reflects all live entities of one kind visible under a `LIKE` pattern
/// over schema names.
pub async fn reflect_entities(
    conn: &mut PgConnection,
    kind: EntityKind,
    schema_pattern: &str,
) -> Result<Vec<ReplaceableEntity>> {
    match kind {
        EntityKind::Function => reflect_functions(conn, schema_pattern).await,
        EntityKind::View => reflect_views(conn, schema_pattern).await,
        EntityKind::MaterializedView => reflect_materialized_views(conn, schema_pattern).await,
        EntityKind::Trigger => reflect_triggers(conn, schema_pattern).await,
        EntityKind::Extension => reflect_extensions(conn, schema_pattern).await,
    }
}

async fn reflect_functions(
    conn: &mut PgConnection,
    schema_pattern: &str,
) -> Result<Vec<ReplaceableEntity>> {
    let rows = sqlx::query(FUNCTIONS_SQL)
        .bind(schema_pattern)
        .fetch_all(conn)
        .await?;
    let mut entities = Vec::with_capacity(rows.len());
    for row in rows {
        // pg_get_functiondef returns a complete CREATE OR REPLACE FUNCTION
        // statement, which is exactly what the parse templates accept.
        let definition: String = row.try_get("definition")?;
        entities.push(ReplaceableEntity::from_sql_for_kind(
            EntityKind::Function,
            &definition,
        )?);
    }
    Ok(entities)
}

async fn reflect_views(
    conn: &mut PgConnection,
    schema_pattern: &str,
) -> Result<Vec<ReplaceableEntity>> {
    let rows = sqlx::query(VIEWS_SQL)
        .bind(schema_pattern)
        .fetch_all(conn)
        .await?;
    let mut entities = Vec::with_capacity(rows.len());
    for row in rows {
        let schema: String = row.try_get("schema")?;
        let name: String = row.try_get("name")?;
        let definition: String = row.try_get("definition")?;
        entities.push(PgView::new(schema, name, definition).into());
    }
    Ok(entities)
}

async fn reflect_materialized_views(
    conn: &mut PgConnection,
    schema_pattern: &str,
) -> Result<Vec<ReplaceableEntity>> {
    let rows = sqlx::query(MATVIEWS_SQL)
        .bind(schema_pattern)
        .fetch_all(conn)
        .await?;
    let mut entities = Vec::with_capacity(rows.len());
    for row in rows {
        let schema: String = row.try_get("schema")?;
        let name: String = row.try_get("name")?;
        let definition: String = row.try_get("definition")?;
        let is_populated: bool = row.try_get("is_populated")?;
        entities.push(
            PgMaterializedView::new(schema, name, definition)
                .with_data(is_populated)
                .into(),
        );
    }
    Ok(entities)
}

async fn reflect_triggers(
    conn: &mut PgConnection,
    schema_pattern: &str,
) -> Result<Vec<ReplaceableEntity>> {
    let rows = sqlx::query(TRIGGERS_SQL)
        .bind(schema_pattern)
        .fetch_all(conn)
        .await?;
    let mut entities = Vec::with_capacity(rows.len());
    for row in rows {
        let definition: String = row.try_get("definition")?;
        entities.push(ReplaceableEntity::from_sql_for_kind(
            EntityKind::Trigger,
            &definition,
        )?);
    }
    Ok(entities)
}

async fn reflect_extensions(
    conn: &mut PgConnection,
    schema_pattern: &str,
) -> Result<Vec<ReplaceableEntity>> {
    let rows = sqlx::query(EXTENSIONS_SQL)
        .bind(schema_pattern)
        .fetch_all(conn)
        .await?;
    let mut entities = Vec::with_capacity(rows.len());
    for row in rows {
        let schema: String = row.try_get("schema")?;
        let name: String = row.try_get("name")?;
        entities.push(PgExtension::new(schema, name).into());
    }
    Ok(entities)
}

/// All non-system schemas in the database.
pub async fn reflect_schemas(conn: &mut PgConnection) -> Result<Vec<String>> {
    let rows = sqlx::query(SCHEMAS_SQL).fetch_all(conn).await?;
    rows.iter()
        .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
        .collect()
}

/// Whether a schema name belongs to PostgreSQL itself.
#[must_use]
pub fn is_system_schema(schema: &str) -> bool {
    SYSTEM_SCHEMAS.contains(&schema) || schema.starts_with("pg_")
}

/// A check constraint as reflected from `pg_constraint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedCheckConstraint {
    /// Schema of the owning table.
    pub schema: String,
    /// Owning table name.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// The check expression with the `CHECK (..)` wrapper stripped.
    pub expression: String,
}

/// Reflects user check constraints in one schema.
pub async fn reflect_check_constraints(
    conn: &mut PgConnection,
    schema: &str,
) -> Result<Vec<ReflectedCheckConstraint>> {
    let rows = sqlx::query(CHECK_CONSTRAINTS_SQL)
        .bind(schema)
        .fetch_all(conn)
        .await?;
    let mut constraints = Vec::with_capacity(rows.len());
    for row in rows {
        let definition: String = row.try_get("definition")?;
        constraints.push(ReflectedCheckConstraint {
            schema: row.try_get("schema")?,
            table: row.try_get("table_name")?,
            name: row.try_get("name")?,
            expression: strip_check_wrapper(&definition),
        });
    }
    Ok(constraints)
}

/// Strips the `CHECK (..)` wrapper `pg_get_constraintdef` puts around the
/// expression.
fn strip_check_wrapper(definition: &str) -> String {
    let trimmed = definition.trim();
    let body = trimmed
        .strip_prefix("CHECK")
        .or_else(|| trimmed.strip_prefix("check"))
        .unwrap_or(trimmed)
        .trim();
    match body.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        Some(inner) => inner.trim().to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_wrapper_is_stripped_once() {
        assert_eq!(strip_check_wrapper("CHECK ((balance >= 0))"), "(balance >= 0)");
        assert_eq!(strip_check_wrapper("CHECK (balance >= 0)"), "balance >= 0");
        assert_eq!(strip_check_wrapper("balance >= 0"), "balance >= 0");
    }

    #[test]
    fn system_schemas_are_recognized() {
        assert!(is_system_schema("pg_catalog"));
        assert!(is_system_schema("pg_toast_temp_1"));
        assert!(is_system_schema("information_schema"));
        assert!(!is_system_schema("public"));
    }
}
