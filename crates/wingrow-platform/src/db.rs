use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};

const SCHEMA: &str = include_str!("../sql/schema.sql");

pub async fn connect_database(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Idempotent; every statement in the schema is `IF NOT EXISTS`.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .context("failed to apply schema")?;
    Ok(())
}
