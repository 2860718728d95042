//! CLI command definitions and dispatch.

pub mod history;
pub mod job;
pub mod migrate;

use clap::{Parser, Subcommand};

use mft_core::config::AppConfig;
use mft_core::error::AppError;
use mft_database::Stores;
use mft_worker::Engine;

use crate::output::OutputFormat;

/// MFT: scheduled managed file transfers
#[derive(Debug, Parser)]
#[command(name = "mft", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file (defaults to config/ plus MFT_ENV)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply database migrations
    Migrate,
    /// Job management
    Job(job::JobArgs),
    /// Execution history
    History(history::HistoryArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(self.config.as_deref())?;
        match &self.command {
            Commands::Migrate => migrate::execute(&config).await,
            Commands::Job(args) => job::execute(args, &config, self.format).await,
            Commands::History(args) => history::execute(args, &config, self.format).await,
        }
    }
}

/// Load configuration from an explicit file or the environment layering.
pub fn load_config(path: Option<&str>) -> Result<AppConfig, AppError> {
    match path {
        Some(path) => AppConfig::load_from(path),
        None => {
            let env = std::env::var("MFT_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Open the stores and wire an engine without starting the tick loop.
pub async fn open_engine(config: &AppConfig) -> Result<Engine, AppError> {
    let stores = Stores::open(&config.database).await?;
    Engine::with_default_providers(config, stores)
}
