//! Label database queries

use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::types::Label;

/// Case-insensitive exact-name lookup
pub async fn find_label_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<Label>> {
    let label = sqlx::query_as::<_, Label>(
        "SELECT id, name, color FROM labels WHERE LOWER(name) = LOWER($1) ORDER BY name LIMIT 1"
    )
    .bind(name)
    .fetch_optional(conn)
    .await?;

    Ok(label)
}

pub async fn get_label(pool: &PgPool, label_id: Uuid) -> Result<Option<Label>> {
    let label = sqlx::query_as::<_, Label>("SELECT id, name, color FROM labels WHERE id = $1")
        .bind(label_id)
        .fetch_optional(pool)
        .await?;

    Ok(label)
}
