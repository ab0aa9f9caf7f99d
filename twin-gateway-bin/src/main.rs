use clap::Parser;
use std::{env::current_dir, path::PathBuf};
use tracing::info;
use twin_gateway_common::Logger;
use twin_gateway_core::TwinGateway;
use twin_gateway_error::{TGError, TGResult};
use twin_gateway_models::Settings;

/// Twin Gateway - in-memory digital twin service
///
/// Serializes all twin access on a single command engine, validates inbound
/// updates, and fans change events out to topic subscriptions.
#[derive(Parser)]
#[command(name = "twin-gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Twin Gateway", long_about = None)]
struct Cli {
    /// Sets a custom config file with full path
    ///
    /// If not specified, the gateway looks for 'gateway.toml' in the current
    /// working directory. Any setting can also be overridden via `TWIN__*`
    /// environment variables.
    #[arg(short, long, env = "TWIN_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> TGResult<()> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(p) => p,
        None => {
            let dir = current_dir()
                .map_err(|e| TGError::from(format!("Failed to get current directory: {e}")))?;
            dir.join("gateway.toml")
        }
    };

    let mut logger = Logger::default();
    logger.initialize()?;

    let settings = Settings::new(&config_path.to_string_lossy())?;
    let gateway = TwinGateway::start(settings);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    gateway.stop().await?;
    Ok(())
}
