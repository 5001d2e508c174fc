//! Connection pool management.

use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            acquire_timeout_ms = config.acquire_timeout_ms,
            "Database pool created"
        );

        Ok(Self { pool })
    }

    /// Lazily connecting pool; no connection is opened until first use
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy(&config.url)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 AS health")
            .fetch_one(&self.pool)
            .await?;

        let health: i32 = row.try_get("health")?;
        Ok(health == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
