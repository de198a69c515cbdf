use thiserror::Error;

/// Expose all controller components used by main
pub mod operator;
pub mod resources;

/// The reconciliation engine and per-kind behaviour
pub mod reconcilers;

/// Credential resolution and client construction
pub mod connector;

/// Capability contracts for remote clients
pub mod external;

/// HTTP client for the Confluent Cloud and Kafka REST APIs
pub mod confluent;

/// Runtime configuration read from the environment
pub mod config;

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;
pub use metrics::Metrics;

pub use connector::ConnectionError;
pub use external::RemoteError;
pub use reconcilers::Decision;

/// API group shared by every resource kind this operator manages
pub const API_GROUP: &str = "confluent.managed.io";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Lookup error: {0}")]
    Lookup(#[source] RemoteError),

    #[error("Remote object `{name}` is missing; it was removed outside of this operator")]
    RemoteObjectMissing { name: String },

    #[error("Create error: {0}")]
    Create(#[source] RemoteError),

    #[error("Update error: {0}")]
    Update(#[source] RemoteError),

    #[error("Delete error: {0}")]
    Delete(#[source] RemoteError),

    /// The remote side already applied `action`; only the local bookkeeping failed.
    #[error("Status write failed after {action}: {source}")]
    StatusWrite {
        action: Decision,
        #[source]
        source: kube::Error,
    },

    #[error("Illegal resource `{0}`: {1}")]
    IllegalResource(String, String),

    #[error("Finalizer Error: {0}")]
    // NB: awkward type because finalizer::Error embeds the reconciler error (which is this)
    // so boxing this error to break cycles
    FinalizerError(#[source] Box<kube::runtime::finalizer::Error<Error>>),

    #[error("Invalid configuration for {key}: {reason}")]
    Config { key: &'static str, reason: String },

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::Connection(_) => "connection",
            Error::Lookup(_) => "lookup",
            Error::RemoteObjectMissing { .. } => "remote_object_missing",
            Error::Create(_) => "create",
            Error::Update(_) => "update",
            Error::Delete(_) => "delete",
            Error::StatusWrite { .. } => "status_write",
            Error::IllegalResource(..) => "illegal_resource",
            Error::FinalizerError(e) => match e.as_ref() {
                kube::runtime::finalizer::Error::ApplyFailed(inner)
                | kube::runtime::finalizer::Error::CleanupFailed(inner) => inner.metric_label(),
                _ => "finalizer",
            },
            Error::Config { .. } => "config",
            Error::Metrics(_) => "metrics",
            Error::NetworkError(_) => "network",
        }
    }
}
