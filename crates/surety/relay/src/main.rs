//! Flight Surety relay
//!
//! Deploys the protocol in-process, registers the oracle fleet, answers
//! status requests and serves the health surface.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use surety_relay::{RelayConfig, RelayError, RelayResult, Server};

/// Flight Surety relay CLI
#[derive(Parser)]
#[command(name = "surety-relay")]
#[command(about = "Flight Surety relay - oracle fleet and health surface", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SURETY_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "SURETY_LISTEN_ADDR")]
    listen: Option<String>,

    /// Number of oracle identities to register
    #[arg(long, env = "SURETY_ORACLES_COUNT")]
    oracles: Option<usize>,

    /// Seed for oracle status answers
    #[arg(long, env = "SURETY_STATUS_SEED")]
    seed: Option<u64>,

    /// Log level
    #[arg(long, env = "SURETY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "SURETY_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> RelayResult<()> {
    let cli = Cli::parse();

    let mut config = RelayConfig::load(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| RelayError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(count) = cli.oracles {
        config.oracles.count = count;
    }
    if cli.seed.is_some() {
        config.oracles.status_seed = cli.seed;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

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
        listen = %config.server.listen_addr,
        oracles = config.oracles.count,
        "Starting Flight Surety relay"
    );

    let server = Server::new(config)?;
    server.run().await
}
