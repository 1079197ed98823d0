use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_success, require_postgres};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::DatabaseManager;
use crate::services::AuthService;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a login account")]
    Add {
        #[arg(help = "Username")]
        username: String,

        #[arg(long, help = "Password")]
        password: String,

        #[arg(long, help = "Role to grant (repeatable): admin, manager, user")]
        role: Vec<String>,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Add { username, password, role } => {
            require_postgres()?;

            let stores = DatabaseManager::open(&config().database).await?;
            let auth = AuthService::new(stores.users, &config().security);
            let user = auth.create_user(&username, &password, role).await?;

            output_success(
                &output_format,
                &format!("User '{}' created", user.username),
                Some(json!({ "user": user })),
            )
        }
    }
}
