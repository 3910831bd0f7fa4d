//! Graceful shutdown handling.

use log::{info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels `shutdown` when the process receives Ctrl-C.
///
/// The returned task also ends once `shutdown` is cancelled elsewhere.
pub fn cancel_on_ctrl_c(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("Ctrl-C received, stopping after the current run");
                    shutdown.cancel();
                }
                Err(e) => {
                    warn!("Could not listen for Ctrl-C: {e}");
                    shutdown.cancelled().await;
                }
            },
            _ = shutdown.cancelled() => {}
        }
    })
}
