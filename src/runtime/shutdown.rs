//! # Shutdown
//!
//! Translates SIGTERM / ctrl-c into a daemon stop request.

use crate::daemon::StopHandle;
use tracing::{info, warn};

/// Resolve on the first ctrl-c or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => warn!(?err, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Stop the daemon once a shutdown signal arrives
pub fn spawn_shutdown_handler(stop: StopHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("🛑 Shutdown signal received, stopping pollers");
        stop.stop();
    })
}
