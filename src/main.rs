use clap::Parser;
use tracing_subscriber::EnvFilter;

use hierarchy_api_rust::config::{self, Environment, StorageBackend};
use hierarchy_api_rust::database::DatabaseManager;
use hierarchy_api_rust::{app, AppState};

#[derive(Parser)]
#[command(name = "hierarchy-api")]
#[command(about = "Position hierarchy HTTP API")]
#[command(version)]
struct Args {
    #[arg(long, help = "Bind address (overrides HOST)")]
    host: Option<String>,

    #[arg(long, help = "Listen port (overrides PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Storage backend: memory or postgres (overrides STORAGE_BACKEND)")]
    backend: Option<StorageBackend>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let mut config = config::config().clone();

    let default_filter = match config.environment {
        Environment::Development => "info,tower_http=debug",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(backend) = args.backend {
        config.database.backend = backend;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    tracing::info!(
        "Starting Hierarchy API in {:?} mode with {:?} storage",
        config.environment,
        config.database.backend
    );

    let stores = DatabaseManager::open(&config.database).await?;
    let bootstrap_admin = config.security.bootstrap_admin.clone();
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(config, stores);
    if let Some(admin) = bootstrap_admin {
        if state.auth.seed_admin(&admin).await? {
            tracing::info!("Seeded bootstrap admin '{}'", admin.username);
        }
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("Hierarchy API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
