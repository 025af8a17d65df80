//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, server startup,
//! Kubernetes client, backends and the daemon.

use crate::backend::build_backends;
use crate::cluster::KubeCluster;
use crate::config::{load_config, ServerConfig};
use crate::daemon::Daemon;
use crate::observability::{self, metrics::PrometheusMetrics};
use crate::poller::{ExternalSecretPollerFactory, PollerContext};
use crate::server::{start_server, ServerState};
use crate::watch::{ExternalSecretEvents, KubeWatchSource, ReconnectBackoff};
use anyhow::{anyhow, Result};
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Everything `main` needs to run the controller
#[derive(Debug)]
pub struct InitializationResult {
    pub daemon: Daemon,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Backend construction
/// - Daemon and watch stream setup
pub async fn initialize() -> Result<InitializationResult> {
    // Required for rustls 0.23+ when no default provider is set via features.
    // Fails only if another provider was installed first, which is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    observability::logging::init_tracing();

    info!(
        "Starting External Secrets Controller v{}",
        env!("CARGO_PKG_VERSION")
    );

    let (controller_config, server_config, backend_settings) = load_config();
    info!(
        "Polling every {:?}{}",
        controller_config.poller_interval,
        if controller_config.polling_disabled {
            " (polling disabled)"
        } else {
            ""
        }
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = server_state.clone();
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });
    wait_for_server_ready(&server_config, &server_state, &server_handle).await?;

    let client = Client::try_default().await?;

    let backends = Arc::new(build_backends(&backend_settings).await);
    let cluster = Arc::new(KubeCluster::new(client.clone()));
    let context = PollerContext::new(
        &controller_config,
        backends,
        cluster,
        Arc::new(PrometheusMetrics),
    );
    let factory = Arc::new(ExternalSecretPollerFactory::new(context));

    let events = ExternalSecretEvents::open(
        Arc::new(KubeWatchSource::new(client)),
        ReconnectBackoff::new(
            controller_config.watch_reconnect_min_backoff,
            controller_config.watch_reconnect_max_backoff,
        ),
    );

    info!("Controller initialized, starting daemon...");

    Ok(InitializationResult {
        daemon: Daemon::new(events, factory),
        server_state,
    })
}

/// Poll until the HTTP listener is bound, the server task died, or the startup timeout passed
async fn wait_for_server_ready(
    config: &ServerConfig,
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = config.startup_timeout;
    let poll_interval = config.bind_poll_interval;
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }

        if server_state.is_bound.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
