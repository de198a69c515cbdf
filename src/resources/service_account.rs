use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ManagedStatus, ProviderConfigReference};

/// Specification for a Confluent Cloud service account
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    kind = "ServiceAccount",
    group = "confluent.managed.io",
    version = "v1alpha1",
    status = "ServiceAccountStatus",
    doc = "A Confluent Cloud service account",
    category = "confluent",
    printcolumn = r#"{ "name": "ready", "type": "string", "description": "latest Ready condition", "jsonPath": ".status.ready" }"#,
    printcolumn = r#"{ "name": "synced", "type": "string", "description": "latest Synced condition", "jsonPath": ".status.synced" }"#,
    printcolumn = r#"{ "name": "external-name", "type": "string", "description": "name in Confluent Cloud", "jsonPath": ".metadata.annotations.confluent\\.managed\\.io/external-name" }"#,
    printcolumn = r#"{ "name": "id", "type": "string", "description": "remote identifier", "jsonPath": ".status.atProvider.id" }"#,
    printcolumn = r#"{ "name": "description", "type": "string", "description": "declared description", "jsonPath": ".spec.forProvider.description" }"#,
    printcolumn = r#"{ "name": "age", "type": "date", "jsonPath": ".metadata.creationTimestamp" }"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountSpec {
    /// The `ProviderConfig` holding credentials for Confluent Cloud.
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,

    /// The desired state of the remote service account.
    pub for_provider: ServiceAccountParameters,
}

/// Configurable fields of a service account
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountParameters {
    /// Free-form description shown in Confluent Cloud.
    #[serde(default)]
    pub description: String,
}

/// A service account as last read from Confluent Cloud
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountObservation {
    /// The Confluent-assigned identifier, e.g. `sa-abc123`.
    pub id: String,

    pub display_name: String,

    #[serde(default)]
    pub description: String,
}

pub type ServiceAccountStatus = ManagedStatus<ServiceAccountObservation>;
