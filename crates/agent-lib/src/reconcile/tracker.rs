//! Workload state tracker
//!
//! Compares each workload listing against the tracked records, logs first
//! sightings and phase transitions, and retires terminal workloads once they
//! drop out of the metrics listing.

use super::active::ActiveSet;
use super::archive::RetiredArchive;
use crate::events::{EventSink, LifecycleEvent};
use crate::models::{observation_time, WorkloadObservation, WorkloadRecord};
use crate::source::SnapshotSource;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct WorkloadTracker {
    active: ActiveSet,
    retired: RetiredArchive,
}

impl WorkloadTracker {
    pub fn new(retired: RetiredArchive) -> Self {
        Self {
            active: ActiveSet::new(),
            retired,
        }
    }

    pub fn active(&self) -> &ActiveSet {
        &self.active
    }

    pub fn retired(&self) -> &RetiredArchive {
        &self.retired
    }

    pub(crate) fn retired_mut(&mut self) -> &mut RetiredArchive {
        &mut self.retired
    }

    /// Apply one workload listing, in listing order.
    ///
    /// Workloads missing from the listing are left as they are; they only
    /// leave the active set through retirement.
    pub async fn reconcile(
        &mut self,
        workloads: &[WorkloadObservation],
        present_in_metrics: &HashSet<String>,
        now: DateTime<Utc>,
        source: &dyn SnapshotSource,
        sink: &dyn EventSink,
    ) {
        for observed in workloads {
            // Retirement is final
            if self.retired.contains(&observed.name) {
                continue;
            }

            if self.active.contains(&observed.name) {
                self.update(observed, present_in_metrics, now, source, sink)
                    .await;
            } else {
                self.observe(observed, now, source, sink).await;
            }
        }
    }

    async fn observe(
        &mut self,
        observed: &WorkloadObservation,
        now: DateTime<Utc>,
        source: &dyn SnapshotSource,
        sink: &dyn EventSink,
    ) {
        let record = WorkloadRecord::observed(observed, now);
        let detail = fetch_detail(source, sink, &record.name).await;

        sink.emit(LifecycleEvent::FirstObserved {
            record: &record,
            detail: detail.as_deref(),
        });
        self.active.insert(record);
    }

    async fn update(
        &mut self,
        observed: &WorkloadObservation,
        present_in_metrics: &HashSet<String>,
        now: DateTime<Utc>,
        source: &dyn SnapshotSource,
        sink: &dyn EventSink,
    ) {
        let record = match self.active.get_mut(&observed.name) {
            Ok(record) => record,
            Err(fault) => {
                sink.emit(LifecycleEvent::Fault(&fault));
                return;
            }
        };

        if record.status != observed.phase {
            let previous = record.status;
            record.status = observed.phase;
            record.last_change = observation_time(now);

            let detail = fetch_detail(source, sink, &observed.name).await;
            sink.emit(LifecycleEvent::StatusChanged {
                record: &*record,
                previous,
                detail: detail.as_deref(),
            });
        }

        // Presence in the metrics listing holds off retirement
        if present_in_metrics.contains(&observed.name) || !record.status.is_terminal() {
            return;
        }

        match self.active.remove(&observed.name) {
            Ok(record) => {
                sink.emit(LifecycleEvent::Retired { record: &record });
                debug!(pod_name = %record.name, status = %record.status, "Retiring pod");
                if !self.retired.push(record, observation_time(now)) {
                    warn!(pod_name = %observed.name, "Pod already present in retired archive");
                }
            }
            Err(fault) => sink.emit(LifecycleEvent::Fault(&fault)),
        }
    }
}

/// Fetch a detail blob; a failure is reported and only affects this workload
async fn fetch_detail(
    source: &dyn SnapshotSource,
    sink: &dyn EventSink,
    name: &str,
) -> Option<String> {
    match source.fetch_detail(name).await {
        Ok(detail) => Some(detail),
        Err(fault) => {
            sink.emit(LifecycleEvent::Fault(&fault));
            None
        }
    }
}
