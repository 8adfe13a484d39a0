//! Reconciliation tick driver
//!
//! Runs one reconciliation pass per polling interval. The pass is awaited
//! inline, so a slow pass delays the next one but never overlaps it.

use crate::events::EventSink;
use crate::health::HealthRegistry;
use crate::observability::AgentMetrics;
use crate::reconcile::{ReconcileEngine, ReconcilerConfig, TickReport};
use crate::source::SnapshotSource;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the tick driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Polling interval (default: 15 seconds)
    pub interval: Duration,
    /// Engine configuration
    pub reconciler: ReconcilerConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

/// Owns the reconcile engine and drives it on a fixed period
pub struct TickDriver {
    engine: ReconcileEngine,
    source: Arc<dyn SnapshotSource>,
    sink: Arc<dyn EventSink>,
    health: Option<HealthRegistry>,
    metrics: Option<AgentMetrics>,
    config: DriverConfig,
}

impl TickDriver {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        sink: Arc<dyn EventSink>,
        config: DriverConfig,
    ) -> Self {
        Self {
            engine: ReconcileEngine::new(config.reconciler.clone()),
            source,
            sink,
            health: None,
            metrics: None,
            config,
        }
    }

    pub fn engine(&self) -> &ReconcileEngine {
        &self.engine
    }

    /// Run ticks until a shutdown signal arrives
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> ReconcileEngine {
        info!(
            interval_secs = self.config.interval.as_secs(),
            archive_threshold = self.config.reconciler.archive_threshold,
            retention_secs = self.config.reconciler.archive_retention.num_seconds(),
            "Starting reconciliation loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick_count = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!(ticks = tick_count, "Shutting down reconciliation loop");
                    break;
                }
                _ = ticker.tick() => {
                    tick_count += 1;
                    let report = self.tick_once().await;

                    if report.aborted {
                        warn!(tick = tick_count, "Tick aborted, retrying next interval");
                    } else if report.duration > self.config.interval {
                        warn!(
                            tick = tick_count,
                            elapsed_ms = report.duration.as_millis(),
                            "Tick took longer than the polling interval"
                        );
                    } else {
                        debug!(tick = tick_count, active = report.active, retired = report.retired, "Tick finished");
                    }
                }
            }
        }

        self.engine
    }

    /// Run a single tick now and publish its outcome
    pub async fn tick_once(&mut self) -> TickReport {
        let now = chrono::Utc::now();
        let report = self
            .engine
            .tick(self.source.as_ref(), self.sink.as_ref(), now)
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.observe_tick(&report);
        }
        if let Some(health) = &self.health {
            health.record_tick(&report).await;
        }

        report
    }
}

/// Builder for creating the tick driver
pub struct TickDriverBuilder {
    source: Option<Arc<dyn SnapshotSource>>,
    sink: Option<Arc<dyn EventSink>>,
    health: Option<HealthRegistry>,
    metrics: Option<AgentMetrics>,
    config: DriverConfig,
}

impl TickDriverBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            source: None,
            sink: None,
            health: None,
            metrics: None,
            config: DriverConfig::default(),
        }
    }

    /// Set the snapshot source
    pub fn source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the event sink
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Publish tick outcomes to a health registry
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Publish tick outcomes to Prometheus
    pub fn metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the polling interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the archive size that triggers cleanup
    pub fn archive_threshold(mut self, threshold: usize) -> Self {
        self.config.reconciler.archive_threshold = threshold;
        self
    }

    /// Set the archive retention window
    pub fn archive_retention(mut self, retention: chrono::Duration) -> Self {
        self.config.reconciler.archive_retention = retention;
        self
    }

    /// Build the tick driver
    pub fn build(self) -> Result<TickDriver> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Snapshot source is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("Event sink is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Polling interval must be greater than zero");
        }

        let mut driver = TickDriver::new(source, sink, self.config);
        driver.health = self.health;
        driver.metrics = self.metrics;
        Ok(driver)
    }
}

impl Default for TickDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fault;
    use crate::events::recording::RecordingSink;
    use crate::health::ComponentStatus;
    use crate::models::{RawPodMetrics, WorkloadObservation, WorkloadPhase};
    use crate::source::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Source that counts listings and never overlaps calls
    struct CountingSource {
        listings: AtomicUsize,
        in_flight: AtomicBool,
        delay: Duration,
        fail: AtomicBool,
    }

    impl CountingSource {
        fn new(delay: Duration) -> Self {
            Self {
                listings: AtomicUsize::new(0),
                in_flight: AtomicBool::new(false),
                delay,
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl SnapshotSource for CountingSource {
        async fn list_workloads(&self) -> Result<Vec<WorkloadObservation>, Fault> {
            assert!(!self.in_flight.swap(true, Ordering::SeqCst), "ticks overlapped");
            tokio::time::sleep(self.delay).await;
            self.listings.fetch_add(1, Ordering::SeqCst);
            self.in_flight.store(false, Ordering::SeqCst);
            Ok(vec![WorkloadObservation::new(
                "web-0",
                "uid-1",
                WorkloadPhase::Running,
            )])
        }

        async fn list_metrics(&self) -> Result<Vec<RawPodMetrics>, Fault> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Fault::MetricsListing {
                    reason: "metrics API unavailable".to_string(),
                });
            }
            Ok(vec![])
        }

        async fn fetch_detail(&self, name: &str) -> Result<String, Fault> {
            Ok(format!("{{\"name\":\"{}\"}}", name))
        }
    }

    #[test]
    fn test_driver_config_default() {
        let config = DriverConfig::default();
        assert_eq!(config.interval, Duration::from_secs(15));
        assert_eq!(config.reconciler.archive_threshold, 1000);
        assert_eq!(config.reconciler.archive_retention.num_hours(), 24);
    }

    #[test]
    fn test_builder_requires_source_and_sink() {
        let sink: Arc<dyn EventSink> = Arc::new(RecordingSink::new());
        assert!(TickDriverBuilder::new().sink(sink.clone()).build().is_err());

        let source: Arc<dyn SnapshotSource> = Arc::new(CountingSource::new(Duration::ZERO));
        assert!(TickDriverBuilder::new().source(source.clone()).build().is_err());

        assert!(TickDriverBuilder::new()
            .source(source.clone())
            .sink(sink.clone())
            .interval(Duration::ZERO)
            .build()
            .is_err());

        let driver = TickDriverBuilder::new()
            .source(source)
            .sink(sink)
            .archive_threshold(10)
            .archive_retention(chrono::Duration::minutes(5))
            .build()
            .unwrap();
        assert_eq!(driver.config.reconciler.archive_threshold, 10);
    }

    #[tokio::test]
    async fn test_tick_once_updates_health() {
        let source = Arc::new(CountingSource::new(Duration::ZERO));
        let health = HealthRegistry::new();
        let mut driver = TickDriverBuilder::new()
            .source(source.clone())
            .sink(Arc::new(RecordingSink::new()))
            .health(health.clone())
            .build()
            .unwrap();

        source.fail.store(true, Ordering::SeqCst);
        let report = driver.tick_once().await;
        assert!(report.aborted);
        assert_eq!(health.health().await.status, ComponentStatus::Degraded);

        source.fail.store(false, Ordering::SeqCst);
        let report = driver.tick_once().await;
        assert!(!report.aborted);
        assert!(driver.engine().active().contains("web-0"));
        assert!(health.readiness().await.ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ticks_never_overlap() {
        // Each tick takes longer than the interval
        let source = Arc::new(CountingSource::new(Duration::from_secs(40)));
        let driver = TickDriverBuilder::new()
            .source(source.clone())
            .sink(Arc::new(RecordingSink::new()))
            .interval(Duration::from_secs(15))
            .build()
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(driver.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(130)).await;
        shutdown_tx.send(()).unwrap();
        let engine = handle.await.unwrap();

        let listings = source.listings.load(Ordering::SeqCst);
        assert!(listings >= 2 && listings <= 4, "listings = {}", listings);
        assert_eq!(engine.active().len(), 1);
    }
}
