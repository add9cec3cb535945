//! Forex Arena Production Service
//!
//! Entry point for the Forex Arena backend. Starts the price simulator and
//! the REST/WebSocket gateway, then waits for a shutdown signal.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use forex_arena_service::{
    graceful_shutdown, initialize_logging, load_configuration, setup_signal_handlers,
    wait_for_shutdown, ServiceState,
};

#[derive(Debug, Parser)]
#[command(name = "forex-arena", version, about = "Forex Arena trading competition backend")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = load_configuration(args.config.as_deref())?;

    // Logging depends on the configured level and format
    initialize_logging(&config.logging)?;
    info!("Starting Forex Arena Service v{}", env!("CARGO_PKG_VERSION"));

    // Create service state
    let service_state = Arc::new(
        ServiceState::new(config).await.context("Failed to initialize service")?,
    );
    info!("Service state initialized");

    setup_signal_handlers(service_state.clone())?;
    info!("Signal handlers configured");

    let simulator_handle = service_state.start_simulator();
    let (addr, gateway_handle) = service_state.start_gateway()?;

    info!("Forex Arena Service is running on {}. Press Ctrl+C to shutdown gracefully.", addr);
    wait_for_shutdown(&service_state).await;

    info!("Shutdown signal received. Initiating graceful shutdown...");
    graceful_shutdown(service_state, simulator_handle, gateway_handle).await?;

    info!("Forex Arena Service shutdown complete");
    Ok(())
}
