//! # External Secrets Controller
//!
//! A Kubernetes controller that materializes `Secret` objects from external
//! secret stores: AWS Secrets Manager, AWS Systems Manager Parameter Store,
//! HashiCorp Vault, Azure Key Vault and Google Cloud Secret Manager.
//!
//! ## Overview
//!
//! 1. **Watch** - `ExternalSecret` resources are watched in every namespace
//! 2. **Daemon** - keeps one poller per `ExternalSecret`, restarting it on change
//! 3. **Poll** - each poller periodically checks the namespace permission
//!    policy, fetches values from its backend and applies the generated Secret
//! 4. **Observe** - every sync is counted in Prometheus metrics and reflected
//!    in the resource status
//!
//! ## Usage
//!
//! ```yaml
//! apiVersion: kubernetes-client.io/v1
//! kind: ExternalSecret
//! metadata:
//!   name: hello-service
//! spec:
//!   backendType: secretsManager
//!   data:
//!     - key: hello-service/password
//!       name: password
//! ```

pub mod backend;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod crd;
pub mod daemon;
pub mod observability;
pub mod poller;
pub mod runtime;
pub mod server;
pub mod watch;

pub use crd::{ExternalSecret, ExternalSecretSpec, ExternalSecretStatus};
