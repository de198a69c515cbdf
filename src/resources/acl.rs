use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ManagedStatus, ProviderConfigReference};

/// Specification for the Kafka ACL bindings of one principal on one cluster
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    kind = "Acl",
    group = "confluent.managed.io",
    version = "v1alpha1",
    status = "AclStatus",
    doc = "The Kafka ACL bindings of a principal on a Confluent Cloud cluster",
    category = "confluent",
    printcolumn = r#"{ "name": "ready", "type": "string", "description": "latest Ready condition", "jsonPath": ".status.ready" }"#,
    printcolumn = r#"{ "name": "synced", "type": "string", "description": "latest Synced condition", "jsonPath": ".status.synced" }"#,
    printcolumn = r#"{ "name": "cluster", "type": "string", "description": "kafka cluster", "jsonPath": ".spec.forProvider.cluster" }"#,
    printcolumn = r#"{ "name": "principal", "type": "string", "description": "bound principal", "jsonPath": ".spec.forProvider.principal" }"#,
    printcolumn = r#"{ "name": "external-name", "type": "string", "description": "name in Confluent Cloud", "jsonPath": ".metadata.annotations.confluent\\.managed\\.io/external-name" }"#,
    printcolumn = r#"{ "name": "age", "type": "date", "jsonPath": ".metadata.creationTimestamp" }"#
)]
#[serde(rename_all = "camelCase")]
pub struct AclSpec {
    /// The `ProviderConfig` holding credentials for Confluent Cloud.
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,

    /// The desired bindings.
    pub for_provider: AclParameters,
}

/// Configurable fields of an ACL set
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AclParameters {
    /// The Kafka cluster id, e.g. `lkc-abc123`.
    pub cluster: String,

    /// The principal every binding applies to, e.g. `User:sa-abc123`.
    pub principal: String,

    /// The bindings granted to the principal. Order is not significant.
    #[serde(default)]
    pub acl_block_list: Vec<AclBlock>,
}

/// One Kafka ACL binding
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct AclBlock {
    /// e.g. `TOPIC`, `GROUP`, `CLUSTER`
    pub resource_type: String,

    pub resource_name: String,

    /// `LITERAL` or `PREFIXED`
    pub pattern_type: String,

    /// e.g. `READ`, `WRITE`, `DESCRIBE`
    pub operation: String,

    /// `ALLOW` or `DENY`
    pub permission: String,

    #[serde(default = "defaults::host")]
    pub host: String,
}

/// The bindings of a principal as last read from the cluster
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AclObservation {
    /// Kafka ACLs carry no identifier of their own, so this is `<cluster>/<principal>`.
    pub id: String,

    pub cluster: String,

    pub principal: String,

    #[serde(default)]
    pub acl_block_observation_list: Vec<AclBlock>,
}

pub type AclStatus = ManagedStatus<AclObservation>;

impl AclBlock {
    /// Kafka normalizes the enum-like fields to upper case, so we compare them that way.
    pub fn normalized(&self) -> Self {
        Self {
            resource_type: self.resource_type.to_uppercase(),
            resource_name: self.resource_name.clone(),
            pattern_type: self.pattern_type.to_uppercase(),
            operation: self.operation.to_uppercase(),
            permission: self.permission.to_uppercase(),
            host: if self.host.is_empty() {
                defaults::host()
            } else {
                self.host.clone()
            },
        }
    }
}

mod defaults {
    pub fn host() -> String {
        "*".into()
    }
}
