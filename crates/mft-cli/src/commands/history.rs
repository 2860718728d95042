//! Execution history commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use mft_core::config::AppConfig;
use mft_core::error::AppError;
use mft_core::types::PageRequest;
use mft_entity::{FileMetadata, JobHistory};

use crate::output::{self, OutputFormat, or_dash};

/// Arguments for history commands
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// History subcommand
    #[command(subcommand)]
    pub command: HistoryCommand,
}

/// History subcommands
#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// Executions of a job, newest first
    List {
        /// Job ID
        job_id: Uuid,
        /// Page number
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Rows per page
        #[arg(long, default_value_t = 25)]
        page_size: u64,
    },
    /// File records of one execution
    Files {
        /// History ID
        history_id: Uuid,
    },
}

/// History row for table output.
#[derive(Debug, Serialize, Tabled)]
pub struct HistoryRow {
    #[tabled(rename = "ID")]
    pub id: Uuid,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Trigger")]
    pub trigger: String,
    #[tabled(rename = "Started")]
    pub start_time: String,
    #[tabled(rename = "Seconds")]
    pub duration: String,
    #[tabled(rename = "Files")]
    pub files: i32,
    #[tabled(rename = "Bytes")]
    pub bytes: i64,
    #[tabled(rename = "Error")]
    pub error: String,
}

impl From<&JobHistory> for HistoryRow {
    fn from(h: &JobHistory) -> Self {
        Self {
            id: h.id,
            status: h.status.to_string(),
            trigger: h.trigger.to_string(),
            start_time: h.start_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            duration: or_dash(h.duration().map(|d| d.num_seconds())),
            files: h.files_transferred,
            bytes: h.bytes_transferred,
            error: or_dash(h.error_message.as_deref()),
        }
    }
}

/// File record row for table output.
#[derive(Debug, Serialize, Tabled)]
pub struct FileRow {
    #[tabled(rename = "File")]
    pub file_name: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Size")]
    pub size: i64,
    #[tabled(rename = "Destination")]
    pub destination: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

impl From<&FileMetadata> for FileRow {
    fn from(f: &FileMetadata) -> Self {
        Self {
            file_name: f.file_name.clone(),
            status: f.status.to_string(),
            size: f.file_size,
            destination: f.destination_path.clone(),
            error: or_dash(f.error_message.as_deref()),
        }
    }
}

/// Execute history commands
pub async fn execute(
    args: &HistoryArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let engine = super::open_engine(config).await?;

    match &args.command {
        HistoryCommand::List {
            job_id,
            page,
            page_size,
        } => {
            let result = engine
                .service
                .history(*job_id, PageRequest::new(*page, *page_size))
                .await?;
            let rows: Vec<HistoryRow> = result.items.iter().map(HistoryRow::from).collect();
            output::print_list(&rows, format);
            if format == OutputFormat::Table {
                println!(
                    "Page {} of {} ({} execution(s))",
                    result.page, result.total_pages, result.total_items
                );
            }
        }
        HistoryCommand::Files { history_id } => {
            let files = engine.service.files(*history_id).await?;
            let rows: Vec<FileRow> = files.iter().map(FileRow::from).collect();
            output::print_list(&rows, format);
        }
    }

    engine.stores.close().await;
    Ok(())
}
