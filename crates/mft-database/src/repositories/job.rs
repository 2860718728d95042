//! Job repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use mft_core::error::{AppError, ErrorKind};
use mft_core::result::AppResult;
use mft_entity::Job;

use crate::store::JobStore;

/// Repository for scheduled job rows.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    async fn list(&self) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list jobs", e))
    }

    async fn list_enabled(&self) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE enabled = TRUE ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to list enabled jobs", e)
            })
    }

    async fn create(&self, job: &Job) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, name, schedule, config_ids, enabled, last_run, next_run, \
             webhook_enabled, webhook_url, webhook_secret, webhook_headers, \
             notify_on_success, notify_on_failure, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING *",
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.schedule)
        .bind(&job.config_ids)
        .bind(job.enabled)
        .bind(job.last_run)
        .bind(job.next_run)
        .bind(job.webhook_enabled)
        .bind(&job.webhook_url)
        .bind(&job.webhook_secret)
        .bind(&job.webhook_headers)
        .bind(job.notify_on_success)
        .bind(job.notify_on_failure)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job", e))
    }

    async fn update(&self, job: &Job) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET name = $2, schedule = $3, config_ids = $4, enabled = $5, \
             webhook_enabled = $6, webhook_url = $7, webhook_secret = $8, webhook_headers = $9, \
             notify_on_success = $10, notify_on_failure = $11, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.schedule)
        .bind(&job.config_ids)
        .bind(job.enabled)
        .bind(job.webhook_enabled)
        .bind(&job.webhook_url)
        .bind(&job.webhook_secret)
        .bind(&job.webhook_headers)
        .bind(job.notify_on_success)
        .bind(job.notify_on_failure)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update job", e))?
        .ok_or_else(|| AppError::not_found(format!("Job {} not found", job.id)))
    }

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET enabled = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(enabled)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to toggle job", e))?
        .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))
    }

    async fn update_schedule_times(
        &self,
        id: Uuid,
        last_run: Option<DateTime<Utc>>,
        next_run: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE jobs SET last_run = COALESCE($2, last_run), next_run = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(last_run)
        .bind(next_run)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update schedule times", e)
        })?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete job", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn references_config(&self, config_id: Uuid) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM jobs WHERE $1 = ANY(config_ids))",
        )
        .bind(config_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to check config references", e)
        })
    }
}
