//! Observability infrastructure for the lifecycle agent
//!
//! Provides:
//! - Prometheus metrics (tick latency, tracked workloads, event and fault counts)
//! - Structured JSON event logging with tracing

use crate::events::{EventSink, LifecycleEvent};
use crate::reconcile::TickReport;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for tick duration (in seconds); ticks include API round trips
const TICK_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AgentMetricsInner {
    tick_duration_seconds: Histogram,
    ticks: IntCounterVec,
    active_workloads: IntGauge,
    retired_workloads: IntGauge,
    freshness_entries: IntGauge,
    events: IntCounterVec,
    faults: IntCounterVec,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            tick_duration_seconds: register_histogram!(
                "podwatch_tick_duration_seconds",
                "Time spent running one reconciliation tick",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_duration_seconds"),

            ticks: register_int_counter_vec!(
                "podwatch_ticks_total",
                "Reconciliation ticks by outcome",
                &["outcome"]
            )
            .expect("Failed to register ticks_total"),

            active_workloads: register_int_gauge!(
                "podwatch_active_workloads",
                "Number of workloads currently tracked as active"
            )
            .expect("Failed to register active_workloads"),

            retired_workloads: register_int_gauge!(
                "podwatch_retired_workloads",
                "Number of workloads held in the retired archive"
            )
            .expect("Failed to register retired_workloads"),

            freshness_entries: register_int_gauge!(
                "podwatch_metrics_freshness_entries",
                "Number of workloads with a remembered metrics timestamp"
            )
            .expect("Failed to register metrics_freshness_entries"),

            events: register_int_counter_vec!(
                "podwatch_events_total",
                "Lifecycle and metrics events written to the event log",
                &["event"]
            )
            .expect("Failed to register events_total"),

            faults: register_int_counter_vec!(
                "podwatch_faults_total",
                "Faults reported during reconciliation",
                &["kind"]
            )
            .expect("Failed to register faults_total"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the outcome of a finished tick
    pub fn observe_tick(&self, report: &TickReport) {
        let inner = self.inner();
        inner
            .tick_duration_seconds
            .observe(report.duration.as_secs_f64());
        let outcome = if report.aborted { "aborted" } else { "completed" };
        inner.ticks.with_label_values(&[outcome]).inc();
        inner.active_workloads.set(report.active as i64);
        inner.retired_workloads.set(report.retired as i64);
        inner.freshness_entries.set(report.freshness_entries as i64);
    }

    /// Count one event written to the log
    pub fn inc_event(&self, event: &str) {
        self.inner().events.with_label_values(&[event]).inc();
    }

    /// Count one fault
    pub fn inc_fault(&self, kind: &str) {
        self.inner().faults.with_label_values(&[kind]).inc();
    }
}

/// Structured logger for agent events
///
/// Writes one JSON record per lifecycle event, metrics sample or fault.
/// Every record carries `event` and `category` fields.
#[derive(Clone)]
pub struct StructuredLogger {
    namespace: String,
    metrics: AgentMetrics,
}

impl StructuredLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            metrics: AgentMetrics::new(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, log_dir: &str) {
        info!(
            event = "agent_started",
            category = "agent",
            namespace = %self.namespace,
            agent_version = %version,
            log_dir = %log_dir,
            "Pod lifecycle agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            category = "agent",
            namespace = %self.namespace,
            reason = %reason,
            "Pod lifecycle agent shutting down"
        );
    }
}

impl EventSink for StructuredLogger {
    fn emit(&self, event: LifecycleEvent<'_>) {
        let name = event.name();
        let category = event.category();

        match event {
            LifecycleEvent::FirstObserved { record, detail } => {
                info!(
                    event = name,
                    category = category,
                    namespace = %self.namespace,
                    pod_name = %record.name,
                    pod_uid = %record.uid,
                    status = %record.status,
                    observed_at = %record.last_change.to_rfc3339(),
                    detail = detail.unwrap_or_default(),
                    detail_available = detail.is_some(),
                    "Pod first observed"
                );
            }
            LifecycleEvent::StatusChanged {
                record,
                previous,
                detail,
            } => {
                info!(
                    event = name,
                    category = category,
                    namespace = %self.namespace,
                    pod_name = %record.name,
                    pod_uid = %record.uid,
                    old_status = %previous,
                    new_status = %record.status,
                    observed_at = %record.last_change.to_rfc3339(),
                    detail = detail.unwrap_or_default(),
                    detail_available = detail.is_some(),
                    "Pod status changed"
                );
            }
            LifecycleEvent::Retired { record } => {
                info!(
                    event = name,
                    category = category,
                    namespace = %self.namespace,
                    pod_name = %record.name,
                    pod_uid = %record.uid,
                    status = %record.status,
                    "Pod retired"
                );
            }
            LifecycleEvent::MetricsSample { sample } => match serde_json::to_string(sample) {
                Ok(payload) => {
                    info!(
                        event = name,
                        category = category,
                        namespace = %sample.namespace,
                        pod_name = %sample.name,
                        sample_timestamp = %sample.timestamp().to_rfc3339(),
                        payload = %payload,
                        "Pod metrics sample"
                    );
                }
                Err(e) => {
                    warn!(
                        event = name,
                        category = category,
                        pod_name = %sample.name,
                        error = %e,
                        "Failed to serialize metrics sample"
                    );
                }
            },
            LifecycleEvent::Fault(fault) => {
                self.metrics.inc_fault(name);
                if fault.is_internal() {
                    error!(
                        event = name,
                        category = category,
                        namespace = %self.namespace,
                        error = %fault,
                        "Internal consistency fault"
                    );
                } else {
                    warn!(
                        event = name,
                        category = category,
                        namespace = %self.namespace,
                        error = %fault,
                        aborts_tick = fault.aborts_tick(),
                        "Reconciliation fault"
                    );
                }
                return;
            }
        }

        self.metrics.inc_event(name);
    }
}
