//! # Pollers
//!
//! One poller per ExternalSecret. On every interval a poller resolves the
//! backend, checks the namespace permission policy, materializes the secret
//! data, applies the generated Secret, records metrics and, when the outcome
//! changed, updates the ExternalSecret status.

mod external_secret_poller;
pub mod permissions;
mod sync;

pub use external_secret_poller::{ExternalSecretPoller, ExternalSecretPollerFactory};
pub use permissions::{PermissionDenied, PermissionPolicy};
pub use sync::{run_tick, sync_once, PollerContext, ReportedStatus, SyncError};

use crate::crd::ExternalSecret;

/// A running synchronization for one ExternalSecret
pub trait Poller: Send {
    /// Arm the interval timer; the first sync runs immediately
    fn start(&mut self);
    /// Disarm the timer. A sync already in flight completes; no new one starts.
    fn stop(&mut self);
}

/// Everything needed to create a poller
#[derive(Debug, Clone)]
pub struct PollerDescriptor {
    /// Registry key: the resource uid, or `namespace/name` without one
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub resource: ExternalSecret,
}

impl From<ExternalSecret> for PollerDescriptor {
    fn from(resource: ExternalSecret) -> Self {
        Self {
            id: resource.identity(),
            name: resource.name_or_unknown().to_string(),
            namespace: resource.namespace_or_default().to_string(),
            resource,
        }
    }
}

pub trait PollerFactory: Send + Sync {
    fn create_poller(&self, descriptor: PollerDescriptor) -> Box<dyn Poller>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ExternalSecretSpec;

    #[test]
    fn test_descriptor_from_resource() {
        let mut resource = ExternalSecret::new("hello", ExternalSecretSpec::default());
        resource.metadata.namespace = Some("team-a".to_string());
        resource.metadata.uid = Some("u-1".to_string());

        let descriptor = PollerDescriptor::from(resource);
        assert_eq!(descriptor.id, "u-1");
        assert_eq!(descriptor.name, "hello");
        assert_eq!(descriptor.namespace, "team-a");
    }

    #[test]
    fn test_descriptor_id_without_uid() {
        let resource = ExternalSecret::new("hello", ExternalSecretSpec::default());
        assert_eq!(PollerDescriptor::from(resource).id, "default/hello");
    }
}
