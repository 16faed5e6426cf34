use std::path::PathBuf;

use clap::Parser;
use parley_store::Database;

/// Minimal real-time chat backend: WebSocket broadcast plus a REST
/// history surface.
#[derive(Parser)]
#[command(name = "parley", version)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8001)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Path to the history database. Defaults to ~/.parley/parley.db.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting parley chat server");

    let db_path = cli
        .db_path
        .unwrap_or_else(|| dirs_home().join(".parley").join("parley.db"));
    let db = Database::open(&db_path).expect("Failed to open database");

    let config = parley_server::ServerConfig {
        port: cli.port,
        bind: cli.bind,
        ..Default::default()
    };
    let handle = parley_server::start(config, db)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "parley ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
