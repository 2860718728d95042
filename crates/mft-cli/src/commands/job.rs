//! Job management commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use mft_core::config::AppConfig;
use mft_core::error::AppError;
use mft_entity::{Job, TriggerKind};

use super::history::HistoryRow;
use crate::output::{self, OutputFormat, or_dash};

/// Arguments for job commands
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job subcommand
    #[command(subcommand)]
    pub command: JobCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// List all jobs
    List,
    /// Run a job now and wait for it to finish
    Run {
        /// Job ID
        id: Uuid,
    },
    /// Copy a job (the copy starts disabled)
    Duplicate {
        /// Job ID
        id: Uuid,
    },
    /// Enable a job
    Enable {
        /// Job ID
        id: Uuid,
    },
    /// Disable a job
    Disable {
        /// Job ID
        id: Uuid,
    },
}

/// Job row for table output.
#[derive(Debug, Serialize, Tabled)]
pub struct JobRow {
    #[tabled(rename = "ID")]
    pub id: Uuid,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Schedule")]
    pub schedule: String,
    #[tabled(rename = "Enabled")]
    pub enabled: bool,
    #[tabled(rename = "Configs")]
    pub configs: usize,
    #[tabled(rename = "Last Run")]
    pub last_run: String,
    #[tabled(rename = "Next Run")]
    pub next_run: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            schedule: job.schedule.clone(),
            enabled: job.enabled,
            configs: job.config_ids.len(),
            last_run: or_dash(job.last_run.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
            next_run: or_dash(job.next_run.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
        }
    }
}

/// Execute job commands
pub async fn execute(
    args: &JobArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let engine = super::open_engine(config).await?;
    let service = &engine.service;

    match &args.command {
        JobCommand::List => {
            let jobs = service.list().await?;
            let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
            output::print_list(&rows, format);
        }
        JobCommand::Run { id } => {
            let history = engine
                .runner
                .run_to_completion(*id, TriggerKind::Manual)
                .await?;
            output::print_item(&HistoryRow::from(&history), format);
            if !history.succeeded() {
                return Err(AppError::internal(format!(
                    "Run failed: {}",
                    history.error_message.as_deref().unwrap_or("unknown error")
                )));
            }
        }
        JobCommand::Duplicate { id } => {
            let copy = service.duplicate(*id).await?;
            output::print_item(&JobRow::from(&copy), format);
        }
        JobCommand::Enable { id } => {
            let job = service.set_enabled(*id, true).await?;
            output::print_success(&format!("Job '{}' enabled", job.name));
        }
        JobCommand::Disable { id } => {
            let job = service.set_enabled(*id, false).await?;
            output::print_success(&format!("Job '{}' disabled", job.name));
        }
    }

    engine.stores.close().await;
    Ok(())
}
