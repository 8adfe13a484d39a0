//! Events produced by reconciliation
//!
//! Every lifecycle transition, new metrics sample and fault is handed to an
//! [`EventSink`]. The production sink is
//! [`StructuredLogger`](crate::observability::StructuredLogger).

use crate::error::Fault;
use crate::models::{PodMetrics, WorkloadPhase, WorkloadRecord};

/// A single record on the event stream
#[derive(Debug, Clone, Copy)]
pub enum LifecycleEvent<'a> {
    /// Workload seen for the first time
    FirstObserved {
        record: &'a WorkloadRecord,
        detail: Option<&'a str>,
    },
    /// Workload phase differs from the one recorded
    StatusChanged {
        record: &'a WorkloadRecord,
        previous: WorkloadPhase,
        detail: Option<&'a str>,
    },
    /// Workload moved to the retired archive
    Retired { record: &'a WorkloadRecord },
    /// Strictly newer metrics sample
    MetricsSample { sample: &'a PodMetrics },
    Fault(&'a Fault),
}

impl LifecycleEvent<'_> {
    /// Value of the `event` field on the stream
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::FirstObserved { .. } => "pod_first_observed",
            LifecycleEvent::StatusChanged { .. } => "pod_status_changed",
            LifecycleEvent::Retired { .. } => "pod_retired",
            LifecycleEvent::MetricsSample { .. } => "pod_metrics_sample",
            LifecycleEvent::Fault(fault) => fault.kind().as_str(),
        }
    }

    /// Value of the `category` field, lets operators filter faults out
    pub fn category(&self) -> &'static str {
        match self {
            LifecycleEvent::Fault(_) => "fault",
            _ => "lifecycle",
        }
    }
}

/// Durable destination for events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent<'_>);
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn emit(&self, event: LifecycleEvent<'_>) {
        (**self).emit(event)
    }
}
