use std::time::Instant;

use kube::ResourceExt;
use prometheus::{histogram_opts, opts, HistogramVec, IntCounterVec, Registry};

use crate::{reconcilers::Decision, Error};

/// Reconciliation metrics, labelled by resource kind
#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounterVec,
    pub failures: IntCounterVec,
    pub actions: IntCounterVec,
    pub reconcile_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "confluent_operator_reconcile_duration_seconds",
                "The duration of reconcile to complete in seconds"
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
            &["kind"],
        )?;
        let failures = IntCounterVec::new(
            opts!(
                "confluent_operator_reconciliation_errors_total",
                "reconciliation errors",
            ),
            &["kind", "instance", "error"],
        )?;
        let reconciliations = IntCounterVec::new(
            opts!("confluent_operator_reconciliations_total", "reconciliations"),
            &["kind"],
        )?;
        let actions = IntCounterVec::new(
            opts!(
                "confluent_operator_actions_total",
                "remote actions decided by reconciliation"
            ),
            &["kind", "action"],
        )?;

        Ok(Metrics {
            reconciliations,
            failures,
            actions,
            reconcile_duration,
        })
    }

    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconciliations.clone()))?;
        registry.register(Box::new(self.actions.clone()))?;
        Ok(self)
    }

    pub fn reconcile_failure<K: ResourceExt>(&self, kind: &str, resource: &K, e: &Error) {
        self.failures
            .with_label_values(&[kind, resource.name_any().as_str(), e.metric_label()])
            .inc()
    }

    pub fn action(&self, kind: &str, decision: Decision) {
        self.actions
            .with_label_values(&[kind, decision.as_str()])
            .inc()
    }

    pub fn count_and_measure(&self, kind: &str) -> ReconcileMeasurer {
        self.reconciliations.with_label_values(&[kind]).inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.with_label_values(&[kind]),
        }
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct ReconcileMeasurer {
    start: Instant,
    metric: prometheus::Histogram,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric.observe(duration);
    }
}
