use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where to find the credentials used to talk to Confluent Cloud
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    kind = "ProviderConfig",
    group = "confluent.managed.io",
    version = "v1alpha1",
    doc = "Credentials for reaching Confluent Cloud",
    category = "confluent",
    printcolumn = r#"{ "name": "source", "type": "string", "description": "credentials source", "jsonPath": ".spec.credentials.source" }"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// Account-level credentials in `<key>:<secret>` form.
    pub credentials: ProviderCredentialsSource,

    /// Credentials scoped to a single resource kind, selected by identifier.
    #[serde(default)]
    pub api_credentials: Vec<ApiCredentials>,
}

/// Selects the account-level credential material
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentialsSource {
    pub source: CredentialsSource,

    /// Used when `source` is `Secret`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,

    /// Used when `source` is `Environment`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvSelector>,

    /// Used when `source` is `Filesystem`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsSelector>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum CredentialsSource {
    Secret,
    Environment,
    Filesystem,
}

/// A key within a namespaced secret
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    pub namespace: String,
    pub name: String,
    pub key: String,
}

/// An environment variable of the operator process
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct EnvSelector {
    pub name: String,
}

/// A file readable by the operator process
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct FsSelector {
    pub path: String,
}

/// Credentials for the API serving one resource kind
#[derive(Deserialize, Serialize, Clone, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiCredentials {
    /// Which resource kind these apply to, e.g. `acls.confluent.managed.io`.
    pub identifier: String,

    pub key: String,

    pub secret: String,

    /// Base URL of the API. Required for Kafka REST; optional for Confluent Cloud APIs.
    #[serde(default)]
    pub endpoint: String,
}

impl ApiCredentials {
    /// Whether this is the placeholder used when nothing matched
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.secret.is_empty()
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("identifier", &self.identifier)
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
