//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mft_entity::{ProviderType, TransferConfig};

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since start.
    pub uptime_seconds: u64,
    /// `connected` or `unavailable`.
    pub database: String,
    /// Jobs holding a scheduler slot.
    pub scheduled_jobs: usize,
}

/// Simple message response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message.
    pub message: String,
}

/// A transfer config without its credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub id: Uuid,
    pub name: String,
    pub source_type: ProviderType,
    pub source_path: String,
    pub destination_type: ProviderType,
    pub destination_path: String,
    pub file_pattern: Option<String>,
    pub output_pattern: Option<String>,
    pub archive_enabled: bool,
    pub archive_path: Option<String>,
    pub delete_after_transfer: bool,
    pub skip_processed_files: bool,
    pub max_concurrent_transfers: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TransferConfig> for ConfigResponse {
    fn from(c: TransferConfig) -> Self {
        Self {
            id: c.id,
            name: c.name,
            source_type: c.source_type,
            source_path: c.source_path,
            destination_type: c.destination_type,
            destination_path: c.destination_path,
            file_pattern: c.file_pattern,
            output_pattern: c.output_pattern,
            archive_enabled: c.archive_enabled,
            archive_path: c.archive_path,
            delete_after_transfer: c.delete_after_transfer,
            skip_processed_files: c.skip_processed_files,
            max_concurrent_transfers: c.max_concurrent_transfers,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}
