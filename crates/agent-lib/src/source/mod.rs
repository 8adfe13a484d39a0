//! Snapshot sources
//!
//! A source supplies the two point-in-time listings consumed by every tick
//! and, on demand, the raw detail blob of a single workload.

mod kubernetes;

pub use kubernetes::KubeSnapshotSource;

use crate::error::Fault;
use crate::models::{RawPodMetrics, WorkloadObservation};

pub use async_trait::async_trait;

/// Trait for cluster snapshot implementations
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// List every workload currently present, in listing order
    async fn list_workloads(&self) -> Result<Vec<WorkloadObservation>, Fault>;

    /// List the latest metrics item of every workload that has one
    async fn list_metrics(&self) -> Result<Vec<RawPodMetrics>, Fault>;

    /// Fetch the serialized detail of one workload for audit logging
    async fn fetch_detail(&self, name: &str) -> Result<String, Fault>;
}
