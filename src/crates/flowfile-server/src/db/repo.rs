//! Run-history repository, grounded on `orchestrator::db::repositories`'s
//! one-struct-per-aggregate pattern (`TaskRepository`, `WorkflowRepository`,
//! ...): a zero-sized struct whose associated functions take the pool
//! explicitly rather than holding one, so callers share a single pool
//! across repositories.

use super::connection::DatabasePool;
use super::error::DatabaseError;
use chrono::Utc;
use flowfile_types::{FlowId, RunId};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub flow_id: i64,
    pub flow_name: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
}

pub struct RunRepository;

impl RunRepository {
    pub async fn create(
        pool: &DatabasePool,
        run_id: &RunId,
        flow_id: FlowId,
        flow_name: &str,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO runs (run_id, flow_id, flow_name, status, started_at, finished_at)
             VALUES (?, ?, ?, 'running', ?, NULL)",
        )
        .bind(&run_id.0)
        .bind(flow_id.0 as i64)
        .bind(flow_name)
        .bind(&now)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_finished(
        pool: &DatabasePool,
        run_id: &RunId,
        status: &str,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE runs SET status = ?, finished_at = ? WHERE run_id = ?")
            .bind(status)
            .bind(&now)
            .bind(&run_id.0)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn get(pool: &DatabasePool, run_id: &RunId) -> Result<RunRecord, DatabaseError> {
        sqlx::query_as::<_, RunRecord>("SELECT * FROM runs WHERE run_id = ?")
            .bind(&run_id.0)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("run {run_id}")))
    }

    pub async fn list_for_flow(
        pool: &DatabasePool,
        flow_id: FlowId,
    ) -> Result<Vec<RunRecord>, DatabaseError> {
        Ok(sqlx::query_as::<_, RunRecord>(
            "SELECT * FROM runs WHERE flow_id = ? ORDER BY started_at DESC",
        )
        .bind(flow_id.0 as i64)
        .fetch_all(pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::DatabaseConnection;

    #[tokio::test]
    async fn create_then_mark_finished_updates_status() {
        let conn = DatabaseConnection::connect("sqlite::memory:").await.unwrap();
        conn.run_migrations().await.unwrap();
        let run_id = RunId("run_test".into());

        RunRepository::create(conn.pool(), &run_id, FlowId(1), "demo").await.unwrap();
        let record = RunRepository::get(conn.pool(), &run_id).await.unwrap();
        assert_eq!(record.status, "running");

        RunRepository::mark_finished(conn.pool(), &run_id, "success").await.unwrap();
        let record = RunRepository::get(conn.pool(), &run_id).await.unwrap();
        assert_eq!(record.status, "success");
        assert!(record.finished_at.is_some());
    }
}
