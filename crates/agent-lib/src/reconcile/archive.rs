//! Retired workload archive
//!
//! Holds retired records in retirement order. Eviction is count-triggered and
//! time-windowed: once the archive grows past its threshold, the prefix of
//! entries retired before the retention window is dropped in one go.

use crate::error::Fault;
use crate::models::WorkloadRecord;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Default archive size that triggers cleanup
pub const DEFAULT_ARCHIVE_THRESHOLD: usize = 1000;

/// Default retention window (24 hours)
pub fn default_retention() -> Duration {
    Duration::hours(24)
}

/// A retired record with its retirement time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetiredEntry {
    pub record: WorkloadRecord,
    pub retired_at: DateTime<Utc>,
}

/// Result of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// Names dropped from the archive, oldest first
    pub purged: Vec<String>,
}

#[derive(Debug)]
pub struct RetiredArchive {
    entries: VecDeque<RetiredEntry>,
    members: HashSet<String>,
    threshold: usize,
    retention: Duration,
}

impl RetiredArchive {
    pub fn new(threshold: usize, retention: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            members: HashSet::new(),
            threshold,
            retention,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in retirement order
    pub fn iter(&self) -> impl Iterator<Item = &RetiredEntry> {
        self.entries.iter()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Append a retired record. Returns false if the name is already archived.
    pub fn push(&mut self, record: WorkloadRecord, retired_at: DateTime<Utc>) -> bool {
        if !self.members.insert(record.name.clone()) {
            return false;
        }
        self.entries.push_back(RetiredEntry { record, retired_at });
        true
    }

    /// Drop entries retired before the retention window once over threshold.
    ///
    /// The first entry retired inside the window and everything after it
    /// survive. If the archive is over threshold but nothing is inside the
    /// window, the archive is left untouched and a fault is returned.
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> Result<CleanupOutcome, Fault> {
        if self.entries.len() <= self.threshold {
            return Ok(CleanupOutcome::default());
        }

        let keep_from = match now.checked_sub_signed(self.retention) {
            Some(cutoff) => self.entries.iter().position(|e| e.retired_at > cutoff),
            // Window reaches before the representable epoch
            None => Some(0),
        };

        let Some(keep_from) = keep_from else {
            return Err(Fault::ArchiveWindowMismatch {
                len: self.entries.len(),
                threshold: self.threshold,
                retention_secs: self.retention.num_seconds(),
            });
        };

        let purged: Vec<String> = self
            .entries
            .drain(..keep_from)
            .map(|e| e.record.name)
            .collect();
        self.members = self.entries.iter().map(|e| e.record.name.clone()).collect();

        debug!(
            purged = purged.len(),
            remaining = self.entries.len(),
            "Retired archive cleaned up"
        );

        Ok(CleanupOutcome { purged })
    }
}

impl Default for RetiredArchive {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_THRESHOLD, default_retention())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WorkloadObservation, WorkloadPhase};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
    }

    fn retired(name: &str) -> WorkloadRecord {
        WorkloadRecord::observed(
            &WorkloadObservation::new(name, "uid", WorkloadPhase::Succeeded),
            now(),
        )
    }

    /// Archive with `total` entries; the first `stale` ones retired 25h ago
    fn archive_with(total: usize, stale: usize) -> RetiredArchive {
        let mut archive = RetiredArchive::default();
        for i in 0..total {
            let at = if i < stale {
                now() - Duration::hours(25) + Duration::seconds(i as i64)
            } else {
                now() - Duration::hours(1) + Duration::seconds(i as i64)
            };
            assert!(archive.push(retired(&format!("pod-{}", i + 1)), at));
        }
        archive
    }

    #[test]
    fn test_cleanup_below_threshold_is_noop() {
        let mut archive = archive_with(1000, 1000);
        let outcome = archive.cleanup(now()).unwrap();
        assert!(outcome.purged.is_empty());
        assert_eq!(archive.len(), 1000);
    }

    #[test]
    fn test_cleanup_truncates_stale_prefix() {
        let mut archive = archive_with(1001, 5);

        let outcome = archive.cleanup(now()).unwrap();

        assert_eq!(
            outcome.purged,
            vec!["pod-1", "pod-2", "pod-3", "pod-4", "pod-5"]
        );
        assert_eq!(archive.len(), 996);
        assert_eq!(archive.iter().next().unwrap().record.name, "pod-6");
        assert_eq!(archive.iter().last().unwrap().record.name, "pod-1001");
        assert!(!archive.contains("pod-5"));
        assert!(archive.contains("pod-6"));
        assert_eq!(archive.members.len(), archive.len());
    }

    #[test]
    fn test_cleanup_without_entries_in_window_leaves_archive() {
        let mut archive = archive_with(1001, 1001);

        let result = archive.cleanup(now());

        assert!(matches!(
            result,
            Err(Fault::ArchiveWindowMismatch {
                len: 1001,
                threshold: 1000,
                ..
            })
        ));
        assert_eq!(archive.len(), 1001);
        assert!(archive.contains("pod-1"));
    }

    #[test]
    fn test_cleanup_boundary_is_exclusive() {
        let mut archive = RetiredArchive::new(1, Duration::hours(24));
        archive.push(retired("exact"), now() - Duration::hours(24));
        archive.push(retired("inside"), now() - Duration::hours(23));

        let outcome = archive.cleanup(now()).unwrap();
        assert_eq!(outcome.purged, vec!["exact"]);
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_push_rejects_duplicates() {
        let mut archive = RetiredArchive::default();
        assert!(archive.push(retired("a"), now()));
        assert!(!archive.push(retired("a"), now()));
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_cleanup_postcondition() {
        let mut archive = archive_with(1500, 700);
        archive.cleanup(now()).unwrap();

        let cutoff = now() - archive.retention();
        assert!(
            archive.len() <= archive.threshold()
                || archive.iter().all(|e| e.retired_at > cutoff)
        );
    }
}
