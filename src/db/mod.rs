//! Database module

pub mod queries;
pub mod store;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

fn migrator() -> Migrator {
    sqlx::migrate!("./migrations")
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");
    migrator().run(pool).await.context("Failed to run migrations")?;
    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_create_lead_schema() {
        let migrator = migrator();
        let schema: String = migrator
            .iter()
            .filter(|m| !m.migration_type.is_down_migration())
            .map(|m| m.sql.to_string())
            .collect();

        for table in ["users", "brands", "labels", "leads"] {
            assert!(
                schema.contains(&format!("CREATE TABLE {}", table)),
                "missing table {}",
                table
            );
        }
        assert!(schema.contains("leads_phone_key"));
    }
}
