//! The reconciliation engine.
//!
//! One call to [`Engine::reconcile`] is one reconciliation attempt for one
//! declared resource: connect, observe, decide, act, report. The engine keeps
//! no state between attempts; everything it knows comes from the resource
//! (including its last status) and from the remote system.

use std::fmt;

use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use tracing::{info, instrument};

use crate::{
    connector::{ClientFactory, Connector, CredentialResolver},
    external::{ExternalClient, RemoteError, RemoteSnapshot},
    resources::{external_name, Condition, ManagedStatus, ProviderConfigReference},
    Error, Result,
};

pub mod acl;
pub mod service_account;


/// A declared resource the engine knows how to reconcile
pub trait Managed: Resource<DynamicType = ()> + Sized + Send + Sync + 'static {
    /// The desired, kind-specific fields
    type Parameters: Send + Sync;

    /// What the remote system reports for this kind
    type Snapshot: RemoteSnapshot + Clone + Send + Sync;

    /// Identifier of the API credential set used for this kind
    const API_IDENTIFIER: &'static str;

    fn parameters(&self) -> &Self::Parameters;

    fn provider_config_ref(&self) -> &ProviderConfigReference;

    fn managed_status(&self) -> Option<&ManagedStatus<Self::Snapshot>>;

    /// The name to address the remote object by before an external name is assigned.
    ///
    /// Must be deterministic so that repeated attempts agree.
    fn candidate_name(&self) -> Result<String> {
        Ok(self.name_any())
    }

    /// Whether the remote object matches every declared field
    fn is_up_to_date(&self, observed: &Self::Snapshot) -> bool;
}

/// Persists what the engine learned during an attempt
#[async_trait]
pub trait StatusStore<K: Managed>: Send + Sync {
    async fn set_external_name(&self, resource: &K, name: &str) -> Result<(), kube::Error>;

    async fn write_status(
        &self,
        resource: &K,
        status: &ManagedStatus<K::Snapshot>,
    ) -> Result<(), kube::Error>;
}

/// The action chosen for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Create,
    Import,
    Update,
    NoOp,
    Delete,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Create => "create",
            Decision::Import => "import",
            Decision::Update => "update",
            Decision::NoOp => "noop",
            Decision::Delete => "delete",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of a successful attempt
#[derive(Debug, Clone)]
pub struct Reconciled<S> {
    pub decision: Decision,

    /// The external name in effect after this attempt
    pub external_name: Option<String>,

    /// The status that was written back
    pub status: ManagedStatus<S>,
}

/// A remote object found by lookup, with the drift check already applied
pub(crate) struct Observed<S> {
    pub snapshot: S,
    pub up_to_date: bool,
}

/// The decision together with the snapshot it was based on
#[derive(Debug, PartialEq)]
pub(crate) enum Plan<S> {
    Create,
    Import(S),
    Update(S),
    NoOp(S),
}

impl<S> Plan<S> {
    fn decision(&self) -> Decision {
        match self {
            Plan::Create => Decision::Create,
            Plan::Import(_) => Decision::Import,
            Plan::Update(_) => Decision::Update,
            Plan::NoOp(_) => Decision::NoOp,
        }
    }
}

/// Decision table keyed on whether an external name is assigned and what the lookup found.
pub(crate) fn decide<S>(external_name: Option<&str>, observed: Option<Observed<S>>) -> Result<Plan<S>> {
    match (external_name, observed) {
        (None, None) => Ok(Plan::Create),
        // adopted once, now gone; recreating would silently swap the object behind the name
        (Some(name), None) => Err(Error::RemoteObjectMissing {
            name: name.to_owned(),
        }),
        (None, Some(Observed { snapshot, .. })) => Ok(Plan::Import(snapshot)),
        (Some(_), Some(Observed { snapshot, up_to_date: false })) => Ok(Plan::Update(snapshot)),
        (Some(_), Some(Observed { snapshot, up_to_date: true })) => Ok(Plan::NoOp(snapshot)),
    }
}

/// Drives declared resources toward their remote counterparts
pub struct Engine<R, F> {
    connector: Connector<R, F>,
}

impl<R: CredentialResolver, F> Engine<R, F> {
    pub fn new(resolver: R, factory: F) -> Self {
        Self {
            connector: Connector::new(resolver, factory),
        }
    }

    /// Run one reconciliation attempt.
    ///
    /// Every failure aborts the attempt before anything later is applied; the
    /// caller decides when to try again.
    #[instrument(skip_all, fields(resource = %resource.name_any()))]
    pub async fn reconcile<K, S>(&self, resource: &K, store: &S) -> Result<Reconciled<K::Snapshot>>
    where
        K: Managed,
        F: ClientFactory<K>,
        S: StatusStore<K>,
    {
        let client = self.connector.connect(resource).await?;
        let mut status = resource.managed_status().cloned().unwrap_or_default();
        let external_name = external_name(resource);

        if resource.meta().deletion_timestamp.is_some() {
            return delete(resource, &client, external_name, status, store).await;
        }

        let name = match &external_name {
            Some(name) => name.clone(),
            None => resource.candidate_name()?,
        };

        let observed = match client.lookup_by_name(&name).await {
            Ok(snapshot) => Some(Observed {
                up_to_date: resource.is_up_to_date(&snapshot),
                snapshot,
            }),
            Err(RemoteError::NotFound) => None,
            Err(e) => return Err(Error::Lookup(e)),
        };

        let plan = decide(external_name.as_deref(), observed)?;
        let decision = plan.decision();
        info!(%decision, remote_name = %name, "Reconciling");

        let assigned_name = match plan {
            Plan::Create => {
                let created = client
                    .create(&name, resource.parameters())
                    .await
                    .map_err(Error::Create)?;
                info!(remote_id = created.remote_id(), "Created remote object");

                status.at_provider = Some(created);
                status.set_condition(Condition::reconcile_success());
                status.set_condition(Condition::creating());
                Some(name)
            }

            Plan::Import(found) => {
                info!(remote_id = found.remote_id(), "Adopting existing remote object");

                status.at_provider = Some(found);
                status.set_condition(Condition::reconcile_success());
                status.set_condition(Condition::creating());
                Some(name)
            }

            // Readiness is only claimed once a later attempt sees the change
            Plan::Update(found) => {
                client
                    .update(found.remote_id(), resource.parameters())
                    .await
                    .map_err(Error::Update)?;

                // Still the pre-update observation; the next attempt refreshes it
                status.at_provider = Some(found);
                status.set_condition(Condition::reconcile_success());
                None
            }

            Plan::NoOp(found) => {
                status.at_provider = Some(found);
                status.set_condition(Condition::reconcile_success());
                status.set_condition(Condition::available());
                None
            }
        };

        let status_write = move |source: kube::Error| Error::StatusWrite {
            action: decision,
            source,
        };
        if let Some(name) = &assigned_name {
            store
                .set_external_name(resource, name)
                .await
                .map_err(status_write)?;
        }
        store
            .write_status(resource, &status)
            .await
            .map_err(status_write)?;

        Ok(Reconciled {
            decision,
            external_name: assigned_name.or(external_name),
            status,
        })
    }
}

async fn delete<K, C, S>(
    resource: &K,
    client: &C,
    external_name: Option<String>,
    mut status: ManagedStatus<K::Snapshot>,
    store: &S,
) -> Result<Reconciled<K::Snapshot>>
where
    K: Managed,
    C: ExternalClient<Spec = K::Parameters, Snapshot = K::Snapshot>,
    S: StatusStore<K>,
{
    status.set_condition(Condition::deleting());

    let remote_id = match (&status.at_provider, &external_name) {
        (Some(observed), _) => Some(observed.remote_id().to_owned()),
        // the id never made it into the status, so find it again by name
        (None, Some(name)) => match client.lookup_by_name(name).await {
            Ok(found) => Some(found.remote_id().to_owned()),
            Err(RemoteError::NotFound) => None,
            Err(e) => return Err(Error::Lookup(e)),
        },
        (None, None) => None,
    };

    match remote_id {
        Some(id) => match client.delete(&id).await {
            Ok(()) => info!(remote_id = %id, "Deleted remote object"),
            Err(RemoteError::NotFound) => info!(remote_id = %id, "Remote object already gone"),
            Err(e) => return Err(Error::Delete(e)),
        },
        None => info!("No remote object to delete"),
    }

    status.at_provider = None;
    store
        .write_status(resource, &status)
        .await
        .map_err(|source| Error::StatusWrite {
            action: Decision::Delete,
            source,
        })?;

    Ok(Reconciled {
        decision: Decision::Delete,
        external_name,
        status,
    })
}
