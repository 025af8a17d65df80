//! # External Secrets Controller
//!
//! Binary entry point. See the library documentation for an overview.

use anyhow::Result;
use external_secrets_controller::runtime::{initialize, spawn_shutdown_handler};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;
    let mut daemon = init_result.daemon;

    let shutdown = spawn_shutdown_handler(daemon.stop_handle());

    init_result.server_state.set_ready(true);
    daemon.start().await;
    init_result.server_state.set_ready(false);

    shutdown.abort();
    info!("External Secrets Controller stopped");
    Ok(())
}
