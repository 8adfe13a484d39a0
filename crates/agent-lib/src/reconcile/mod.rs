//! State reconciliation and eviction engine
//!
//! One [`ReconcileEngine`] owns all state carried between ticks: the active
//! set, the retired archive and the metrics digest. Each tick runs archive
//! cleanup, then the metrics digest, then the workload tracker.

mod active;
mod archive;
mod digest;
mod tracker;


pub use active::ActiveSet;
pub use archive::{
    default_retention, CleanupOutcome, RetiredArchive, RetiredEntry, DEFAULT_ARCHIVE_THRESHOLD,
};
pub use digest::MetricsDigest;
pub use tracker::WorkloadTracker;

use crate::events::{EventSink, LifecycleEvent};
use crate::source::SnapshotSource;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Configuration for the reconcile engine
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Archive size above which cleanup runs (default: 1000)
    pub archive_threshold: usize,
    /// Retired workloads younger than this survive cleanup (default: 24 hours)
    pub archive_retention: chrono::Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            archive_threshold: DEFAULT_ARCHIVE_THRESHOLD,
            archive_retention: default_retention(),
        }
    }
}

/// Summary of one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub duration: Duration,
    /// A snapshot could not be fetched; the tick stopped after cleanup
    pub aborted: bool,
    pub abort_reason: Option<String>,
    pub first_observed: usize,
    pub status_changes: usize,
    pub retired_this_tick: usize,
    pub samples_logged: usize,
    pub purged: usize,
    pub faults: usize,
    pub internal_faults: usize,
    pub active: usize,
    pub retired: usize,
    pub freshness_entries: usize,
}

pub struct ReconcileEngine {
    digest: MetricsDigest,
    tracker: WorkloadTracker,
}

impl ReconcileEngine {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            digest: MetricsDigest::new(),
            tracker: WorkloadTracker::new(RetiredArchive::new(
                config.archive_threshold,
                config.archive_retention,
            )),
        }
    }

    pub fn active(&self) -> &ActiveSet {
        self.tracker.active()
    }

    pub fn retired(&self) -> &RetiredArchive {
        self.tracker.retired()
    }

    pub fn digest(&self) -> &MetricsDigest {
        &self.digest
    }

    /// Bound the retired archive and forget metrics timestamps of purged names.
    ///
    /// A window mismatch is reported and the archive is left untouched.
    pub fn cleanup(&mut self, now: DateTime<Utc>, sink: &dyn EventSink) -> CleanupOutcome {
        match self.tracker.retired_mut().cleanup(now) {
            Ok(outcome) => {
                self.digest
                    .forget(outcome.purged.iter().map(String::as_str));
                outcome
            }
            Err(fault) => {
                sink.emit(LifecycleEvent::Fault(&fault));
                CleanupOutcome::default()
            }
        }
    }

    /// Run one full reconciliation pass against `source`
    pub async fn tick(
        &mut self,
        source: &dyn SnapshotSource,
        sink: &dyn EventSink,
        now: DateTime<Utc>,
    ) -> TickReport {
        let started = Instant::now();
        let counting = CountingSink::new(sink);
        let mut report = TickReport::default();

        report.purged = self.cleanup(now, &counting).purged.len();

        let aborted = match source.list_metrics().await {
            Ok(metrics) => {
                let present = self.digest.ingest(&metrics, &counting);
                match source.list_workloads().await {
                    Ok(workloads) => {
                        self.tracker
                            .reconcile(&workloads, &present, now, source, &counting)
                            .await;
                        None
                    }
                    Err(fault) => Some(fault),
                }
            }
            Err(fault) => Some(fault),
        };

        if let Some(fault) = aborted {
            counting.emit(LifecycleEvent::Fault(&fault));
            report.aborted = true;
            report.abort_reason = Some(fault.to_string());
        }

        counting.fill(&mut report);
        report.active = self.tracker.active().len();
        report.retired = self.tracker.retired().len();
        report.freshness_entries = self.digest.len();
        report.duration = started.elapsed();

        debug!(
            first_observed = report.first_observed,
            status_changes = report.status_changes,
            retired = report.retired_this_tick,
            samples = report.samples_logged,
            faults = report.faults,
            aborted = report.aborted,
            elapsed_ms = report.duration.as_millis(),
            "Tick complete"
        );

        report
    }
}

impl Default for ReconcileEngine {
    fn default() -> Self {
        Self::new(ReconcilerConfig::default())
    }
}

/// Forwards events while counting them per kind for the tick report
struct CountingSink<'a> {
    inner: &'a dyn EventSink,
    first_observed: AtomicUsize,
    status_changes: AtomicUsize,
    retired: AtomicUsize,
    samples: AtomicUsize,
    faults: AtomicUsize,
    internal_faults: AtomicUsize,
}

impl<'a> CountingSink<'a> {
    fn new(inner: &'a dyn EventSink) -> Self {
        Self {
            inner,
            first_observed: AtomicUsize::new(0),
            status_changes: AtomicUsize::new(0),
            retired: AtomicUsize::new(0),
            samples: AtomicUsize::new(0),
            faults: AtomicUsize::new(0),
            internal_faults: AtomicUsize::new(0),
        }
    }

    fn fill(&self, report: &mut TickReport) {
        report.first_observed = self.first_observed.load(Ordering::Relaxed);
        report.status_changes = self.status_changes.load(Ordering::Relaxed);
        report.retired_this_tick = self.retired.load(Ordering::Relaxed);
        report.samples_logged = self.samples.load(Ordering::Relaxed);
        report.faults = self.faults.load(Ordering::Relaxed);
        report.internal_faults = self.internal_faults.load(Ordering::Relaxed);
    }
}

impl EventSink for CountingSink<'_> {
    fn emit(&self, event: LifecycleEvent<'_>) {
        let counter = match &event {
            LifecycleEvent::FirstObserved { .. } => &self.first_observed,
            LifecycleEvent::StatusChanged { .. } => &self.status_changes,
            LifecycleEvent::Retired { .. } => &self.retired,
            LifecycleEvent::MetricsSample { .. } => &self.samples,
            LifecycleEvent::Fault(fault) => {
                if fault.is_internal() {
                    self.internal_faults.fetch_add(1, Ordering::Relaxed);
                }
                &self.faults
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.inner.emit(event);
    }
}
