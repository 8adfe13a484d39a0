//! Metrics digest
//!
//! Remembers the newest sample timestamp logged per workload so that repeated
//! or out-of-order samples are never logged twice.

use crate::error::Fault;
use crate::events::{EventSink, LifecycleEvent};
use crate::models::{PodMetrics, RawPodMetrics};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct MetricsDigest {
    freshness: HashMap<String, DateTime<Utc>>,
}

impl MetricsDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every strictly newer sample in the snapshot.
    ///
    /// Returns the names of all workloads listed in the snapshot, including
    /// those whose sample was a duplicate or failed to decode. Items without
    /// a name are reported and left out.
    pub fn ingest(&mut self, snapshot: &[RawPodMetrics], sink: &dyn EventSink) -> HashSet<String> {
        let mut present = HashSet::with_capacity(snapshot.len());

        for raw in snapshot {
            if raw.name.is_empty() {
                sink.emit(LifecycleEvent::Fault(&Fault::UnnamedMetrics {
                    namespace: raw.namespace.clone(),
                }));
                continue;
            }
            present.insert(raw.name.clone());

            let sample = match PodMetrics::decode(raw) {
                Ok(sample) => sample,
                Err(source) => {
                    sink.emit(LifecycleEvent::Fault(&Fault::MalformedMetrics {
                        name: raw.name.clone(),
                        source,
                    }));
                    continue;
                }
            };

            let newer = match self.freshness.get(&sample.name) {
                Some(last) => sample.timestamp() > *last,
                None => true,
            };
            if newer {
                self.freshness
                    .insert(sample.name.clone(), sample.timestamp());
                sink.emit(LifecycleEvent::MetricsSample { sample: &sample });
            }
        }

        present
    }

    /// Drop remembered timestamps, e.g. for names purged from the archive
    pub fn forget<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.freshness.remove(name);
        }
    }

    /// Timestamp of the newest sample logged for a workload
    pub fn last_logged(&self, name: &str) -> Option<DateTime<Utc>> {
        self.freshness.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.freshness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freshness.is_empty()
    }
}
