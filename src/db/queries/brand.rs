//! Brand database queries

use anyhow::Result;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::types::Brand;

/// Exact-name lookup
pub async fn find_brand_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<Brand>> {
    let brand = sqlx::query_as::<_, Brand>("SELECT id, name FROM brands WHERE name = $1")
        .bind(name)
        .fetch_optional(conn)
        .await?;

    Ok(brand)
}

/// Insert a brand unless one with the same name exists.
/// Returns `None` when another writer created it first.
pub async fn create_brand(conn: &mut PgConnection, name: &str) -> Result<Option<Brand>> {
    let brand = sqlx::query_as::<_, Brand>(
        r#"
        INSERT INTO brands (id, name, created_at, updated_at)
        VALUES ($1, $2, NOW(), NOW())
        ON CONFLICT (name) DO NOTHING
        RETURNING id, name
        "#
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_optional(conn)
    .await?;

    Ok(brand)
}
