use async_trait::async_trait;
use thiserror::Error;

/// A failed call against the remote API
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("remote object not found")]
    NotFound,

    #[error("remote API rejected the request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid remote name `{0}`")]
    InvalidName(String),

    #[error("no API credentials configured for `{0}`")]
    Unconfigured(String),

    #[error("{0}")]
    Rejected(String),
}

/// A record read from the remote system
pub trait RemoteSnapshot {
    /// The identifier the remote system addresses this object by
    fn remote_id(&self) -> &str;
}

/// Kind-specific operations against the remote system.
///
/// Implementations hold one authenticated session, built fresh for every
/// reconciliation attempt. The engine never sees anything else of them.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    /// The desired fields of this kind
    type Spec: Send + Sync;

    /// What the remote system reports back
    type Snapshot: RemoteSnapshot + Send + Sync;

    /// Find the remote object addressed by `name`, failing with [`RemoteError::NotFound`]
    async fn lookup_by_name(&self, name: &str) -> Result<Self::Snapshot, RemoteError>;

    async fn create(&self, name: &str, spec: &Self::Spec) -> Result<Self::Snapshot, RemoteError>;

    async fn update(&self, remote_id: &str, spec: &Self::Spec) -> Result<(), RemoteError>;

    /// Remove the remote object. Callers treat [`RemoteError::NotFound`] as success.
    async fn delete(&self, remote_id: &str) -> Result<(), RemoteError>;
}
