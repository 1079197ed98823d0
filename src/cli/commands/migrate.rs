use crate::cli::utils::{output_success, require_postgres};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{DatabaseManager, PgBackend};

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    require_postgres()?;

    let pool = DatabaseManager::connect(&config().database).await?;
    PgBackend::new(pool).migrate().await?;

    output_success(&output_format, "Schema is up to date", None)
}
