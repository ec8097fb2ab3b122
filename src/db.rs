use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

const SCHEMA: &str = include_str!("../migrations/0001_user_scores.sql");

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Builds the pool without connecting; reachability is probed separately
    /// so a down database never blocks startup.
    pub fn connect_lazy(database_url: &str, acquire_timeout: Duration) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)?;

        Ok(Self { pool })
    }

    /// Connects eagerly (utilities and tests).
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }
}

/// Creates the `user_scores` table if it does not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(SCHEMA).execute(pool).await?;
    Ok(())
}
