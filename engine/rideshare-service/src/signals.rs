//! Signal handling for graceful shutdown

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::service::ServiceState;

/// Resolve the returned receiver on Ctrl+C or SIGTERM
pub fn setup_signal_handlers() -> Result<oneshot::Receiver<()>> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let sigterm = Arc::new(AtomicBool::new(false));

    #[cfg(unix)]
    signal_hook::flag::register(signal_hook::consts::SIGTERM, sigterm.clone())?;

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    match result {
                        Ok(()) => info!("Ctrl+C signal received"),
                        Err(e) => error!("Failed to listen for Ctrl+C signal: {}", e),
                    }
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    if sigterm.load(Ordering::Relaxed) {
                        info!("SIGTERM signal received");
                        break;
                    }
                }
            }
        }

        let _ = shutdown_tx.send(());
    });

    Ok(shutdown_rx)
}

/// Stop every component and wait for their tasks within the configured timeout
pub async fn graceful_shutdown(service_state: Arc<ServiceState>, handles: Vec<(&'static str, JoinHandle<()>)>) {
    info!("Starting graceful shutdown...");
    service_state.shutdown();

    let shutdown_timeout = Duration::from_secs(service_state.config.service.shutdown_timeout_secs);
    for (name, handle) in handles {
        match timeout(shutdown_timeout, handle).await {
            Ok(Ok(())) => info!("{} stopped gracefully", name),
            Ok(Err(e)) => error!("{} task failed: {}", name, e),
            Err(_) => warn!("{} did not stop within timeout, forcing shutdown", name),
        }
    }

    service_state.log_summary().await;
    info!("Graceful shutdown complete");
}
