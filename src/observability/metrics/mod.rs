//! # Metrics Module
//!
//! Prometheus metrics for monitoring the controller, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup and registration
//! - `sync_metrics` - Per-ExternalSecret sync outcome (`sync_calls`, `last_state`)
//! - `controller_metrics` - Poller registry size and watch restarts

pub mod controller_metrics;
pub mod registry;
pub mod sync_metrics;

pub use controller_metrics::*;
pub use registry::*;
pub use sync_metrics::*;
