//! Transfer config repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use mft_core::error::{AppError, ErrorKind};
use mft_core::result::AppResult;
use mft_entity::TransferConfig;

use crate::store::ConfigStore;

/// Repository for transfer config rows.
#[derive(Debug, Clone)]
pub struct ConfigRepository {
    pool: PgPool,
}

impl ConfigRepository {
    /// Create a new config repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigStore for ConfigRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<TransferConfig>> {
        sqlx::query_as::<_, TransferConfig>("SELECT * FROM transfer_configs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find config", e))
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<TransferConfig>> {
        sqlx::query_as::<_, TransferConfig>("SELECT * FROM transfer_configs WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load configs", e))
    }

    async fn list(&self) -> AppResult<Vec<TransferConfig>> {
        sqlx::query_as::<_, TransferConfig>("SELECT * FROM transfer_configs ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list configs", e))
    }

    async fn create(&self, config: &TransferConfig) -> AppResult<TransferConfig> {
        sqlx::query_as::<_, TransferConfig>(
            "INSERT INTO transfer_configs (id, name, source_type, source_path, source_credentials, \
             destination_type, destination_path, dest_credentials, file_pattern, output_pattern, \
             archive_enabled, archive_path, delete_after_transfer, skip_processed_files, \
             max_concurrent_transfers, rclone_flags, command_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19) \
             RETURNING *",
        )
        .bind(config.id)
        .bind(&config.name)
        .bind(config.source_type)
        .bind(&config.source_path)
        .bind(&config.source_credentials)
        .bind(config.destination_type)
        .bind(&config.destination_path)
        .bind(&config.dest_credentials)
        .bind(&config.file_pattern)
        .bind(&config.output_pattern)
        .bind(config.archive_enabled)
        .bind(&config.archive_path)
        .bind(config.delete_after_transfer)
        .bind(config.skip_processed_files)
        .bind(config.max_concurrent_transfers)
        .bind(&config.rclone_flags)
        .bind(config.command_id)
        .bind(config.created_at)
        .bind(config.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create config", e))
    }

    async fn update(&self, config: &TransferConfig) -> AppResult<TransferConfig> {
        sqlx::query_as::<_, TransferConfig>(
            "UPDATE transfer_configs SET name = $2, source_type = $3, source_path = $4, \
             source_credentials = $5, destination_type = $6, destination_path = $7, \
             dest_credentials = $8, file_pattern = $9, output_pattern = $10, \
             archive_enabled = $11, archive_path = $12, delete_after_transfer = $13, \
             skip_processed_files = $14, max_concurrent_transfers = $15, rclone_flags = $16, \
             command_id = $17, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(config.id)
        .bind(&config.name)
        .bind(config.source_type)
        .bind(&config.source_path)
        .bind(&config.source_credentials)
        .bind(config.destination_type)
        .bind(&config.destination_path)
        .bind(&config.dest_credentials)
        .bind(&config.file_pattern)
        .bind(&config.output_pattern)
        .bind(config.archive_enabled)
        .bind(&config.archive_path)
        .bind(config.delete_after_transfer)
        .bind(config.skip_processed_files)
        .bind(config.max_concurrent_transfers)
        .bind(&config.rclone_flags)
        .bind(config.command_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update config", e))?
        .ok_or_else(|| AppError::not_found(format!("Transfer config {} not found", config.id)))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM transfer_configs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete config", e))?;
        Ok(result.rows_affected() > 0)
    }
}
