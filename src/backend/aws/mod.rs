//! # AWS Backends
//!
//! Secrets Manager and Systems Manager Parameter Store, sharing one
//! credential source that can assume per-ExternalSecret roles.

mod auth;
mod parameter_store;
mod secrets_manager;

pub use auth::AwsSessionFactory;
pub use parameter_store::ParameterStoreBackend;
pub use secrets_manager::SecretsManagerBackend;
