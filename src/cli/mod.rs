pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "hierarchy")]
#[command(about = "Hierarchy CLI - administration for the position hierarchy service")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply the PostgreSQL schema")]
    Migrate,

    #[command(about = "Login account management")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "Print the nested position hierarchy")]
    Tree,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::User { cmd } => commands::user::handle(cmd, output_format).await,
        Commands::Tree => commands::tree::handle(output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_add_with_roles() {
        let cli = Cli::try_parse_from([
            "hierarchy", "--json", "user", "add", "alice", "--password", "pw", "--role", "admin",
            "--role", "manager",
        ])
        .unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));

        match cli.command {
            Commands::User {
                cmd: commands::user::UserCommands::Add { username, password, role },
            } => {
                assert_eq!(username, "alice");
                assert_eq!(password, "pw");
                assert_eq!(role, ["admin", "manager"]);
            }
            _ => panic!("expected user add"),
        }
    }

    #[test]
    fn user_add_requires_password() {
        assert!(Cli::try_parse_from(["hierarchy", "user", "add", "alice"]).is_err());
    }

    #[test]
    fn parses_bare_commands() {
        assert!(matches!(
            Cli::try_parse_from(["hierarchy", "migrate"]).unwrap().command,
            Commands::Migrate
        ));
        assert!(matches!(
            Cli::try_parse_from(["hierarchy", "tree"]).unwrap().command,
            Commands::Tree
        ));
    }
}
