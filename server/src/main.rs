//! Reflect Server - sends a browser's WebRTC video straight back to it

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use reflect_server::{app, logging, CliArgs, Outcome, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = ServerConfig::load(&args)?;
    logging::init(&config.logging)?;

    info!("Starting Reflect Server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Ports: signaling={}, media={}",
        config.api.port,
        config
            .reflect
            .media_port
            .map_or_else(|| "any".to_string(), |p| p.to_string())
    );
    info!("Codec: {} (PT {})", config.reflect.codec.mime_type, config.reflect.codec.payload_type);

    let outcome = app::run(config, shutdown_signal()).await?;
    if outcome == Outcome::ConnectivityFailure {
        info!("Peer connection failed, exiting");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
