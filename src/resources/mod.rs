use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod acl;
mod provider_config;
mod service_account;
mod status;

pub use acl::*;
pub use provider_config::*;
pub use service_account::*;
pub use status::*;

/// Annotation holding the name a resource is addressed by in the remote system
pub const EXTERNAL_NAME_ANNOTATION: &str = "confluent.managed.io/external-name";

/// Reference to the `ProviderConfig` supplying credentials for a resource
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigReference {
    /// Name of the referenced `ProviderConfig`.
    #[serde(default = "defaults::provider_config")]
    pub name: String,
}

impl Default for ProviderConfigReference {
    fn default() -> Self {
        Self {
            name: defaults::provider_config(),
        }
    }
}

/// The external name of a resource, if one has been assigned
pub fn external_name(resource: &impl ResourceExt) -> Option<String> {
    resource
        .annotations()
        .get(EXTERNAL_NAME_ANNOTATION)
        .filter(|name| !name.is_empty())
        .cloned()
}

mod defaults {
    pub fn provider_config() -> String {
        "default".into()
    }
}
