//! Database migration command.

use mft_core::config::{AppConfig, StoreProvider};
use mft_core::error::AppError;
use mft_database::DatabasePool;

use crate::output;

/// Connect to PostgreSQL and apply pending migrations.
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    if config.database.provider == StoreProvider::Memory {
        return Err(AppError::configuration(
            "Migrations need the postgres store provider",
        ));
    }

    println!("Running database migrations...");
    let pool = DatabasePool::connect(&config.database).await?;
    mft_database::migration::run_migrations(pool.pool()).await?;
    pool.close().await;
    output::print_success("All migrations applied successfully.");
    Ok(())
}
