//! Tictactoe Arena - authoritative match server
//!
//! Real-time tic-tac-toe matches with matchmaking and an optional AI
//! opponent backed by an external move-prediction service.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tictactoe_arena::{
    AppState, Cli, Command, InMemoryStorage, InMemoryWallet, LoggingTransport, MatchRegistry,
    MoveOracle, RecordingNotifier, ServerConfig, router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port, config } => run_server(host, port, config).await,
    }
}

/// Run the match server
async fn run_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<std::path::PathBuf>,
) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Tictactoe Arena match server");

    let mut config = ServerConfig::load(config_path.as_deref())?;
    config.set_bind(host, port);

    let oracle = MoveOracle::new(config.oracle_url(), config.oracle_timeout())?;
    let registry = MatchRegistry::new(Arc::new(LoggingTransport), Some(oracle));

    // Development collaborators; production deployments wire real backends
    // behind the same traits.
    let state = AppState {
        registry,
        storage: Arc::new(InMemoryStorage::default()),
        wallet: Arc::new(InMemoryWallet::default()),
        notifier: Arc::new(RecordingNotifier::default()),
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind((config.host(), config.port())).await?;
    info!(host = %config.host(), port = config.port(), "server ready");
    axum::serve(listener, app).await?;

    Ok(())
}
