//! File metadata repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use mft_core::error::{AppError, ErrorKind};
use mft_core::result::AppResult;
use mft_entity::FileMetadata;

use crate::store::MetadataStore;

/// Repository for append-only file outcome rows.
#[derive(Debug, Clone)]
pub struct MetadataRepository {
    pool: PgPool,
}

impl MetadataRepository {
    /// Create a new metadata repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for MetadataRepository {
    async fn record(&self, m: &FileMetadata) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO file_metadata (id, job_id, config_id, history_id, file_name, file_size, \
             file_hash, original_path, destination_path, status, processed_time, creation_time, \
             mod_time, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(m.id)
        .bind(m.job_id)
        .bind(m.config_id)
        .bind(m.history_id)
        .bind(&m.file_name)
        .bind(m.file_size)
        .bind(&m.file_hash)
        .bind(&m.original_path)
        .bind(&m.destination_path)
        .bind(m.status)
        .bind(m.processed_time)
        .bind(m.creation_time)
        .bind(m.mod_time)
        .bind(&m.error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record file", e))?;
        Ok(())
    }

    async fn lookup_processed(
        &self,
        job_id: Uuid,
        config_id: Uuid,
        original_path: &str,
        file_hash: &str,
    ) -> AppResult<Option<FileMetadata>> {
        sqlx::query_as::<_, FileMetadata>(
            "SELECT * FROM file_metadata \
             WHERE job_id = $1 AND config_id = $2 AND original_path = $3 AND file_hash = $4 \
             AND status <> 'error' \
             ORDER BY processed_time DESC LIMIT 1",
        )
        .bind(job_id)
        .bind(config_id)
        .bind(original_path)
        .bind(file_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to look up file", e))
    }

    async fn list_for_history(&self, history_id: Uuid) -> AppResult<Vec<FileMetadata>> {
        sqlx::query_as::<_, FileMetadata>(
            "SELECT * FROM file_metadata WHERE history_id = $1 ORDER BY processed_time ASC",
        )
        .bind(history_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        // The newest successful row per file identity is the dedup record
        // and survives retention.
        let result = sqlx::query(
            "DELETE FROM file_metadata f
             WHERE f.processed_time < $1
               AND (f.status = 'error'
                    OR EXISTS (
                        SELECT 1 FROM file_metadata n
                        WHERE n.job_id = f.job_id
                          AND n.config_id = f.config_id
                          AND n.original_path = f.original_path
                          AND n.file_hash = f.file_hash
                          AND n.status <> 'error'
                          AND (n.processed_time, n.id) > (f.processed_time, f.id)))",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to prune files", e))?;
        Ok(result.rows_affected())
    }
}
