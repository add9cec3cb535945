//! Signal handling for graceful shutdown

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::service::ServiceState;

/// Flip the service's shutdown flag on Ctrl+C or SIGTERM
pub fn setup_signal_handlers(service_state: Arc<ServiceState>) -> Result<()> {
    // Handle Ctrl+C (SIGINT)
    let state = service_state.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C signal: {}", e);
            return;
        }

        info!("Ctrl+C signal received");
        state.request_shutdown();
    });

    // Handle SIGTERM (Unix only)
    #[cfg(unix)]
    {
        use signal_hook::consts::SIGTERM;
        use std::sync::atomic::{AtomicBool, Ordering};

        let sigterm = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGTERM, sigterm.clone())?;

        tokio::spawn(async move {
            let mut shutdown = service_state.shutdown_signal();
            loop {
                if sigterm.load(Ordering::Relaxed) {
                    info!("SIGTERM signal received");
                    service_state.request_shutdown();
                    break;
                }
                if *shutdown.borrow_and_update() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });
    }

    Ok(())
}

/// Block until shutdown has been requested
pub async fn wait_for_shutdown(service_state: &ServiceState) {
    let mut shutdown = service_state.shutdown_signal();
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

async fn join_with_timeout(name: &str, handle: JoinHandle<()>, limit: Duration) {
    match timeout(limit, handle).await {
        Ok(Ok(())) => info!("{} stopped gracefully", name),
        Ok(Err(e)) => error!("{} task failed: {}", name, e),
        Err(_) => warn!("{} did not stop within timeout, forcing shutdown", name),
    }
}

/// Stop the simulator and the HTTP server, waiting at most the configured timeout for each
pub async fn graceful_shutdown(
    service_state: Arc<ServiceState>,
    simulator_handle: JoinHandle<()>,
    gateway_handle: JoinHandle<()>,
) -> Result<()> {
    info!("Starting graceful shutdown...");
    service_state.request_shutdown();

    let limit = Duration::from_secs(service_state.config.service.shutdown_timeout_secs);
    join_with_timeout("PriceSimulator", simulator_handle, limit).await;
    join_with_timeout("ApiGateway", gateway_handle, limit).await;

    info!("Graceful shutdown complete");
    Ok(())
}
