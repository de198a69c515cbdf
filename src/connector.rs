//! Turns a resource's credential reference into an authenticated client.
//!
//! Connecting has no side effects beyond the authentication handshake, so it
//! is repeated on every reconciliation attempt.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use thiserror::Error;
use tracing::debug;

use crate::{
    external::RemoteError,
    reconcilers::Managed,
    resources::{
        ApiCredentials, CredentialsSource, ProviderConfig, ProviderConfigReference,
        ProviderCredentialsSource,
    },
};

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("cannot get ProviderConfig `{name}`: {source}")]
    ProviderConfig {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("cannot get credentials secret: {0}")]
    Secret(#[source] kube::Error),

    #[error("cannot read credentials file: {0}")]
    File(#[source] std::io::Error),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("invalid client credentials, expected `<key>:<secret>`")]
    InvalidCredentialFormat,

    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[source] RemoteError),
}

/// Everything a `ProviderConfig` resolves to
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    /// Raw account-level credential bytes
    pub secret: Vec<u8>,

    /// Credential sets for individual resource kinds
    pub api_credentials: Vec<ApiCredentials>,
}

/// Account-level key and secret, split out of the raw credential bytes
#[derive(Clone, PartialEq, Eq)]
pub struct CloudCredentials {
    pub key: String,
    pub secret: String,
}

impl CloudCredentials {
    /// Parse `<key>:<secret>`, ignoring surrounding whitespace such as a trailing newline.
    pub fn parse(raw: &[u8]) -> Result<Self, ConnectionError> {
        let raw = std::str::from_utf8(raw).map_err(|_| ConnectionError::InvalidCredentialFormat)?;
        let parts: Vec<&str> = raw.trim().split(':').collect();

        match parts.as_slice() {
            [key, secret] if !key.is_empty() && !secret.is_empty() => Ok(Self {
                key: (*key).to_owned(),
                secret: (*secret).to_owned(),
            }),
            _ => Err(ConnectionError::InvalidCredentialFormat),
        }
    }
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Fetches the credential material a resource refers to
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(
        &self,
        reference: &ProviderConfigReference,
    ) -> Result<ProviderCredentials, ConnectionError>;
}

/// Builds an authenticated client for one resource kind
#[async_trait]
pub trait ClientFactory<K: Managed>: Send + Sync {
    type Client: crate::external::ExternalClient<Spec = K::Parameters, Snapshot = K::Snapshot>;

    async fn new_client(
        &self,
        credentials: CloudCredentials,
        api_credentials: ApiCredentials,
    ) -> Result<Self::Client, ConnectionError>;
}

/// Pick the credential set for `identifier`.
///
/// No match is not an error here: an empty set is handed on and the client fails on first use.
pub fn select_api_credentials(candidates: &[ApiCredentials], identifier: &str) -> ApiCredentials {
    candidates
        .iter()
        .find(|c| c.identifier == identifier)
        .cloned()
        .unwrap_or_else(|| ApiCredentials {
            identifier: identifier.to_owned(),
            ..Default::default()
        })
}

/// Resolves credentials and hands them to the kind's client factory
pub struct Connector<R, F> {
    resolver: R,
    factory: F,
}

impl<R: CredentialResolver, F> Connector<R, F> {
    pub fn new(resolver: R, factory: F) -> Self {
        Self { resolver, factory }
    }

    pub async fn connect<K>(
        &self,
        resource: &K,
    ) -> Result<<F as ClientFactory<K>>::Client, ConnectionError>
    where
        K: Managed,
        F: ClientFactory<K>,
    {
        let reference = resource.provider_config_ref();
        let resolved = self.resolver.resolve(reference).await?;
        let credentials = CloudCredentials::parse(&resolved.secret)?;
        let api_credentials = select_api_credentials(&resolved.api_credentials, K::API_IDENTIFIER);

        debug!(
            provider_config = %reference.name,
            identifier = K::API_IDENTIFIER,
            api_credentials_found = !api_credentials.is_empty(),
            "Connecting"
        );
        self.factory.new_client(credentials, api_credentials).await
    }
}

/// Resolves credentials through `ProviderConfig` objects in the cluster
#[derive(Clone)]
pub struct KubeCredentialResolver {
    client: Client,
}

impl KubeCredentialResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn read_source(&self, source: &ProviderCredentialsSource) -> Result<Vec<u8>, ConnectionError> {
        match source.source {
            CredentialsSource::Secret => {
                let selector = source.secret_ref.as_ref().ok_or_else(|| {
                    ConnectionError::MissingCredentials("secretRef is required for Secret".into())
                })?;

                let secrets = Api::<Secret>::namespaced(self.client.clone(), &selector.namespace);
                let secret = secrets.get(&selector.name).await.map_err(ConnectionError::Secret)?;

                secret
                    .data
                    .and_then(|mut data| data.remove(&selector.key))
                    .map(|value| value.0)
                    .ok_or_else(|| {
                        ConnectionError::MissingCredentials(format!(
                            "key `{}` not found in secret `{}/{}`",
                            selector.key, selector.namespace, selector.name
                        ))
                    })
            }

            CredentialsSource::Environment => {
                let selector = source.env.as_ref().ok_or_else(|| {
                    ConnectionError::MissingCredentials("env is required for Environment".into())
                })?;

                std::env::var(&selector.name)
                    .map(String::into_bytes)
                    .map_err(|e| ConnectionError::MissingCredentials(format!("{}: {e}", selector.name)))
            }

            CredentialsSource::Filesystem => {
                let selector = source.fs.as_ref().ok_or_else(|| {
                    ConnectionError::MissingCredentials("fs is required for Filesystem".into())
                })?;

                tokio::fs::read(&selector.path).await.map_err(ConnectionError::File)
            }
        }
    }
}

#[async_trait]
impl CredentialResolver for KubeCredentialResolver {
    async fn resolve(
        &self,
        reference: &ProviderConfigReference,
    ) -> Result<ProviderCredentials, ConnectionError> {
        let configs = Api::<ProviderConfig>::all(self.client.clone());
        let config = configs
            .get(&reference.name)
            .await
            .map_err(|source| ConnectionError::ProviderConfig {
                name: reference.name.clone(),
                source,
            })?;

        Ok(ProviderCredentials {
            secret: self.read_source(&config.spec.credentials).await?,
            api_credentials: config.spec.api_credentials,
        })
    }
}
