use crate::cli::utils::{render_tree, require_postgres};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::DatabaseManager;
use crate::services::PositionService;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    require_postgres()?;

    let stores = DatabaseManager::open(&config().database).await?;
    let tree = PositionService::new(stores.positions)
        .with_max_tree_depth(config().api.max_tree_depth)
        .find_all_nested()
        .await?;

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tree)?),
        OutputFormat::Text if tree.is_empty() => println!("No positions"),
        OutputFormat::Text => print!("{}", render_tree(&tree)),
    }
    Ok(())
}
