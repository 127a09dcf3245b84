//! Election Daemon - headless host for the election runtime
//!
//! The daemon:
//! - Restores the saved election on startup
//! - Runs the evaluation and activity tickers
//! - Autosaves on a fixed cadence and saves again on shutdown

use clap::Parser;
use election_daemon::{DaemonConfig, DaemonError, DaemonResult, Server};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Election Daemon CLI
#[derive(Parser)]
#[command(name = "electiond")]
#[command(about = "Election Daemon - timed elections, runoffs and recalls", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ELECTIONS_CONFIG")]
    config: Option<String>,

    /// State document path
    #[arg(short, long, env = "ELECTIONS_STATE_PATH")]
    state: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "ELECTIONS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "ELECTIONS_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(state) = cli.state {
        config.storage.state_path = state;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        state_path = %config.storage.state_path.display(),
        autosave_interval_secs = config.storage.autosave_interval_secs,
        "Election daemon configured"
    );

    let server = Server::new(config)?;
    server.run().await
}
