//! # Azure Backends

mod auth;
mod key_vault;

pub use key_vault::AzureKeyVaultBackend;
