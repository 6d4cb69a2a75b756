//! Database connection management, grounded on
//! `orchestrator::db::connection::DatabaseConnection` (an `Arc<SqlitePool>`
//! wrapper exposing health checks and migrations), narrowed to the one
//! table this crate persists (`runs`).

use super::error::DatabaseError;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

pub type DatabasePool = SqlitePool;

#[derive(Clone)]
pub struct DatabaseConnection {
    pool: Arc<DatabasePool>,
}

impl DatabaseConnection {
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(DatabaseError::from)?;
        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_check_succeeds_on_a_fresh_in_memory_db() {
        let conn = DatabaseConnection::connect("sqlite::memory:").await.unwrap();
        conn.run_migrations().await.unwrap();
        assert!(conn.health_check().await.is_ok());
    }
}
