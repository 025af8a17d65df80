//! # Logging
//!
//! Tracing subscriber setup.

use crate::constants::DEFAULT_LOG_FILTER;
use tracing::warn;

/// Install the global fmt subscriber, honouring RUST_LOG
pub fn init_tracing() {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .try_init()
    {
        // Already installed (tests, embedding binaries)
        warn!("Tracing subscriber init returned error: {}", e);
    }
}
