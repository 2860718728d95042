//! Job history repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use mft_core::error::{AppError, ErrorKind};
use mft_core::result::AppResult;
use mft_core::types::{PageRequest, PageResponse};
use mft_entity::JobHistory;

use crate::store::HistoryStore;

/// Repository for job execution rows.
#[derive(Debug, Clone)]
pub struct HistoryRepository {
    pool: PgPool,
}

impl HistoryRepository {
    /// Create a new history repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for HistoryRepository {
    async fn create(&self, history: &JobHistory) -> AppResult<JobHistory> {
        sqlx::query_as::<_, JobHistory>(
            "INSERT INTO job_history (id, job_id, config_id, status, \"trigger\", start_time, \
             end_time, bytes_transferred, files_transferred, error_message, config_results) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
        )
        .bind(history.id)
        .bind(history.job_id)
        .bind(history.config_id)
        .bind(history.status)
        .bind(history.trigger)
        .bind(history.start_time)
        .bind(history.end_time)
        .bind(history.bytes_transferred)
        .bind(history.files_transferred)
        .bind(&history.error_message)
        .bind(&history.config_results)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create history", e))
    }

    async fn finalize(&self, history: &JobHistory) -> AppResult<JobHistory> {
        let updated = sqlx::query_as::<_, JobHistory>(
            "UPDATE job_history SET status = $2, end_time = $3, bytes_transferred = $4, \
             files_transferred = $5, error_message = $6, config_results = $7 \
             WHERE id = $1 AND status = 'running' RETURNING *",
        )
        .bind(history.id)
        .bind(history.status)
        .bind(history.end_time)
        .bind(history.bytes_transferred)
        .bind(history.files_transferred)
        .bind(&history.error_message)
        .bind(&history.config_results)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to finalize history", e))?;

        match updated {
            Some(row) => Ok(row),
            None => match self.find_by_id(history.id).await? {
                Some(_) => Err(AppError::conflict(format!(
                    "History {} is already finalized",
                    history.id
                ))),
                None => Err(AppError::not_found(format!("History {} not found", history.id))),
            },
        }
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<JobHistory>> {
        sqlx::query_as::<_, JobHistory>("SELECT * FROM job_history WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find history", e))
    }

    async fn list_for_job(
        &self,
        job_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<JobHistory>> {
        let page = page.normalized();
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_history WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count history", e))?;

        let rows = sqlx::query_as::<_, JobHistory>(
            "SELECT * FROM job_history WHERE job_id = $1 \
             ORDER BY start_time DESC LIMIT $2 OFFSET $3",
        )
        .bind(job_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list history", e))?;

        Ok(PageResponse::new(rows, page, total as u64))
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM job_history WHERE status <> 'running' AND end_time < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to prune history", e))?;
        Ok(result.rows_affected())
    }
}
