//! Fault taxonomy for reconciliation
//!
//! Faults never abort the process. Transport and malformed-input faults are
//! expected occasionally and retried on the next tick; consistency faults
//! should never happen and cause the offending operation to be skipped.

use thiserror::Error;

/// Broad class of a fault, used to tag records on the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Transport,
    Consistency,
    Cleanup,
    MalformedInput,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Transport => "transport_fault",
            FaultKind::Consistency => "consistency_fault",
            FaultKind::Cleanup => "cleanup_fault",
            FaultKind::MalformedInput => "malformed_input",
        }
    }
}

/// A fault raised while running a reconciliation tick
#[derive(Error, Debug)]
pub enum Fault {
    #[error("Failed to list workloads: {reason}")]
    WorkloadListing { reason: String },

    #[error("Failed to list pod metrics: {reason}")]
    MetricsListing { reason: String },

    #[error("Failed to fetch detail for {name}: {reason}")]
    DetailFetch { name: String, reason: String },

    #[error("Active set index points at a missing record for {name}")]
    ActiveSetMismatch { name: String },

    #[error(
        "Retired archive holds {len} entries (threshold {threshold}) but none retired within the last {retention_secs}s"
    )]
    ArchiveWindowMismatch {
        len: usize,
        threshold: usize,
        retention_secs: i64,
    },

    #[error("Pod metrics item in namespace {namespace} has no name")]
    UnnamedMetrics { namespace: String },

    #[error("Malformed metrics for {name}: {source}")]
    MalformedMetrics {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::WorkloadListing { .. }
            | Fault::MetricsListing { .. }
            | Fault::DetailFetch { .. } => FaultKind::Transport,
            Fault::ActiveSetMismatch { .. } => FaultKind::Consistency,
            Fault::ArchiveWindowMismatch { .. } => FaultKind::Cleanup,
            Fault::UnnamedMetrics { .. } | Fault::MalformedMetrics { .. } => {
                FaultKind::MalformedInput
            }
        }
    }

    /// Whether the fault aborts the remainder of the tick
    pub fn aborts_tick(&self) -> bool {
        matches!(
            self,
            Fault::WorkloadListing { .. } | Fault::MetricsListing { .. }
        )
    }

    /// Whether the fault indicates broken internal bookkeeping
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Fault::ActiveSetMismatch { .. } | Fault::ArchiveWindowMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kinds() {
        let listing = Fault::WorkloadListing {
            reason: "connection refused".to_string(),
        };
        assert_eq!(listing.kind(), FaultKind::Transport);
        assert!(listing.aborts_tick());
        assert!(!listing.is_internal());

        let detail = Fault::DetailFetch {
            name: "web-0".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(detail.kind(), FaultKind::Transport);
        assert!(!detail.aborts_tick());

        let mismatch = Fault::ArchiveWindowMismatch {
            len: 1001,
            threshold: 1000,
            retention_secs: 86400,
        };
        assert_eq!(mismatch.kind().as_str(), "cleanup_fault");
        assert!(mismatch.is_internal());
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::ActiveSetMismatch {
            name: "web-0".to_string(),
        };
        assert_eq!(
            fault.to_string(),
            "Active set index points at a missing record for web-0"
        );
    }
}
