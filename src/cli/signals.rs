//! Signal handling for cancellation
//!
//! Ctrl+C and SIGTERM cancel a shared [`CancellationToken`]; the poller and
//! the command runner both watch it.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels `token` on the first Ctrl+C or SIGTERM
///
/// Returns a handle to the background task that monitors for signals. A
/// signal that cannot be subscribed to is logged and never fires.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            match signal::ctrl_c().await {
                Ok(()) => info!("Ctrl+C signal received"),
                Err(e) => {
                    warn!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("SIGTERM signal received");
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
            _ = token.cancelled() => return,
        }

        info!("Cancelling current operation");
        token.cancel();
    })
}
