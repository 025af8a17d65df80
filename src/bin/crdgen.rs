//! Prints the ExternalSecret CustomResourceDefinition as YAML.
//!
//! ```sh
//! cargo run --bin crdgen > config/crd/externalsecret.yaml
//! ```

use external_secrets_controller::ExternalSecret;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&ExternalSecret::crd())?);
    Ok(())
}
