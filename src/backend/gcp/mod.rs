//! # GCP Backends
//!
//! Native REST client for Secret Manager using reqwest with rustls.

mod secret_manager;

pub use secret_manager::GcpSecretManagerBackend;
