//! Agent library for pod lifecycle observation
//!
//! This crate provides the core functionality for:
//! - Reconciling workload and metrics snapshots into lifecycle events
//! - Bounding retired-workload history over unbounded run times
//! - Kubernetes snapshot sources
//! - Health checks and observability

pub mod driver;
pub mod error;
pub mod events;
pub mod health;
pub mod models;
pub mod observability;
pub mod reconcile;
pub mod source;

pub use driver::{DriverConfig, TickDriver, TickDriverBuilder};
pub use error::{Fault, FaultKind};
pub use events::{EventSink, LifecycleEvent};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use reconcile::{ReconcileEngine, ReconcilerConfig, TickReport};
pub use source::{KubeSnapshotSource, SnapshotSource};
