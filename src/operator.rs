use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use kube::{
    api::{ListParams, Patch, PatchParams},
    runtime::{
        controller::Action,
        events::{Event, EventType, Recorder, Reporter},
        finalizer::{finalizer, Event as Finalizer},
        watcher::Config as WatcherConfig,
        Controller,
    },
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, field, info, instrument, warn, Span};

use crate::{
    config::Config,
    confluent::ConfluentFactory,
    connector::{ClientFactory, KubeCredentialResolver},
    reconcilers::{Decision, Engine, Managed, Reconciled, StatusStore},
    resources::{Acl, Condition, ManagedStatus, ProviderConfig, ServiceAccount, EXTERNAL_NAME_ANNOTATION},
    telemetry, Error, Metrics, Result,
};

pub const FINALIZER: &str = "confluent.managed.io/finalizer";

/// Field manager and event reporter name
pub const MANAGER: &str = "confluent-operator";

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: MANAGER.into(),
        }
    }
}
impl Diagnostics {
    pub fn recorder<K: Resource<DynamicType = ()>>(&self, client: Client, resource: &K) -> Recorder {
        Recorder::new(client, self.reporter.clone(), resource.object_ref(&()))
    }
}

/// State shared between the controllers and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics populated by the reconcilers
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
}

/// State wrapper around the controller outputs for the web server
impl State {
    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub(crate) fn to_context(&self, client: Client, config: Config) -> Result<Arc<Context>> {
        let engine = Engine::new(
            KubeCredentialResolver::new(client.clone()),
            ConfluentFactory::new(&config)?,
        );

        Ok(Arc::new(Context {
            client,
            metrics: Metrics::new()?.register(&self.registry)?,
            diagnostics: self.diagnostics.clone(),
            engine,
            config,
        }))
    }
}

/// Context shared by every reconciliation
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Prometheus metrics
    pub metrics: Metrics,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    pub engine: Engine<KubeCredentialResolver, ConfluentFactory>,
    pub config: Config,
}

/// Writes external names and status back to the cluster with server-side apply
pub struct KubeStore<K> {
    api: Api<K>,
}

impl<K: Managed> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl<K> StatusStore<K> for KubeStore<K>
where
    K: Managed + Clone + Debug + DeserializeOwned,
    K::Snapshot: Serialize,
{
    async fn set_external_name(&self, resource: &K, name: &str) -> Result<(), kube::Error> {
        let patch = json!({
            "apiVersion": K::api_version(&()),
            "kind": K::kind(&()),
            "metadata": {
                "annotations": { EXTERNAL_NAME_ANNOTATION: name },
            },
        });
        let ps = PatchParams::apply(MANAGER).force();
        self.api
            .patch(&resource.name_any(), &ps, &Patch::Apply(&patch))
            .await?;

        Ok(())
    }

    async fn write_status(
        &self,
        resource: &K,
        status: &ManagedStatus<K::Snapshot>,
    ) -> Result<(), kube::Error> {
        let patch = json!({
            "apiVersion": K::api_version(&()),
            "kind": K::kind(&()),
            "status": status,
        });
        let ps = PatchParams::apply(MANAGER).force();
        self.api
            .patch_status(&resource.name_any(), &ps, &Patch::Apply(&patch))
            .await?;

        Ok(())
    }
}

pub struct ConfluentController {
    state: State,
    config: Config,
}

impl ConfluentController {
    pub fn new(state: State, config: Config) -> Self {
        Self { state, config }
    }

    /// Initialize the controllers and shared state (given the crds are installed)
    pub async fn run(self) -> Result<(), anyhow::Error> {
        // Get a k8s client for communicating with the cluster
        let client = Client::try_default().await?;

        // Test that we can actually query for our CRDs (a.k.a. they are installed)
        ensure_installed::<ProviderConfig>(&client).await?;
        ensure_installed::<ServiceAccount>(&client).await?;
        ensure_installed::<Acl>(&client).await?;

        let context = self.state.to_context(client.clone(), self.config)?;

        let watching_config = WatcherConfig::default().any_semantic();
        let service_accounts = Controller::new(
            Api::<ServiceAccount>::all(client.clone()),
            watching_config.clone(),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, context.clone())
        .filter_map(|x| async move { Result::ok(x) })
        .for_each(|_| futures::future::ready(()));

        let acls = Controller::new(Api::<Acl>::all(client), watching_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .filter_map(|x| async move { Result::ok(x) })
            .for_each(|_| futures::future::ready(()));

        tokio::join!(service_accounts, acls);
        Ok(())
    }
}

async fn ensure_installed<K>(client: &Client) -> Result<(), anyhow::Error>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    let api = Api::<K>::all(client.clone());
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        return Err(anyhow::anyhow!("{} CRD is not installed", K::kind(&())));
    }

    Ok(())
}

// Error handler for failed reconciliations
fn error_policy<K: Managed>(resource: Arc<K>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics
        .reconcile_failure(&K::kind(&()), resource.as_ref(), error);
    Action::requeue(ctx.config.error_requeue)
}

/// Main reconciler for every managed resource kind
#[instrument(skip(resource, ctx), fields(trace_id, kind = %K::kind(&())))]
async fn reconcile<K>(resource: Arc<K>, ctx: Arc<Context>) -> Result<Action>
where
    K: Managed + Clone + Debug + Serialize + DeserializeOwned,
    K::Snapshot: Serialize,
    ConfluentFactory: ClientFactory<K>,
{
    // Add some tracing for debugging's sake
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", &field::display(&trace_id));

    // Take some metrics to see the average reconcile time
    let _timer = ctx.metrics.count_and_measure(&K::kind(&()));
    ctx.diagnostics.write().await.last_event = Utc::now();

    let api = Api::<K>::all(ctx.client.clone());
    info!(r#"Starting {} reconciliation for "{}""#, K::kind(&()), resource.name_any());

    finalizer(&api, FINALIZER, resource, |event| async {
        match event {
            Finalizer::Apply(r) | Finalizer::Cleanup(r) => attempt(r, ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::FinalizerError(Box::new(e)))
}

/// One engine attempt; the engine itself chooses the delete path for resources being deleted
async fn attempt<K>(resource: Arc<K>, ctx: Arc<Context>) -> Result<Action>
where
    K: Managed + Clone + Debug + DeserializeOwned,
    K::Snapshot: Serialize,
    ConfluentFactory: ClientFactory<K>,
{
    let store = KubeStore::<K>::new(ctx.client.clone());

    let reconciled = match ctx.engine.reconcile(resource.as_ref(), &store).await {
        Ok(reconciled) => reconciled,
        Err(e) => {
            record_failure(&store, resource.as_ref(), &e).await;
            return Err(e);
        }
    };

    ctx.metrics.action(&K::kind(&()), reconciled.decision);
    publish(&ctx, resource.as_ref(), &reconciled).await;

    Ok(match reconciled.decision {
        Decision::Delete => Action::await_change(),
        _ => Action::requeue(ctx.config.resync_interval),
    })
}

/// Surface the failure on the resource itself
async fn record_failure<K>(store: &KubeStore<K>, resource: &K, error: &Error)
where
    K: Managed + Clone + Debug + DeserializeOwned,
    K::Snapshot: Serialize,
{
    let mut status = resource.managed_status().cloned().unwrap_or_default();
    status.set_condition(Condition::reconcile_error(error));

    if let Err(e) = store.write_status(resource, &status).await {
        warn!("could not record failure on {}: {e}", resource.name_any());
    }
}

/// Publish an event for every action that touched the remote system
async fn publish<K: Managed>(ctx: &Context, resource: &K, reconciled: &Reconciled<K::Snapshot>) {
    let (reason, action) = match reconciled.decision {
        Decision::Create => ("Created", "Creating"),
        Decision::Import => ("Imported", "Importing"),
        Decision::Update => ("Updated", "Updating"),
        Decision::Delete => ("Deleted", "Deleting"),
        Decision::NoOp => return,
    };

    let recorder = ctx
        .diagnostics
        .read()
        .await
        .recorder(ctx.client.clone(), resource);

    let note = match &reconciled.external_name {
        Some(name) => format!("{reason} `{name}` for `{}`", resource.name_any()),
        None => format!("{reason} remote object for `{}`", resource.name_any()),
    };

    if let Err(e) = recorder
        .publish(Event {
            type_: EventType::Normal,
            reason: reason.into(),
            note: Some(note),
            action: action.into(),
            secondary: None,
        })
        .await
    {
        warn!("could not publish event for {}: {e}", resource.name_any());
    }
}
