//! Health check infrastructure for the lifecycle agent
//!
//! Tracks the health of the snapshot source and the reconciler, derived from
//! tick outcomes, for Kubernetes liveness and readiness probes.

use crate::reconcile::TickReport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self::with(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with(ComponentStatus::Unhealthy, Some(message.into()))
    }

    fn with(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
    /// Number of ticks that ran to completion
    pub completed_ticks: u64,
}

impl HealthResponse {
    /// Worst status among components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|h| h.status)
            .max_by_key(|s| match s {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const SNAPSHOT_SOURCE: &str = "snapshot_source";
    pub const RECONCILER: &str = "reconciler";
}

#[derive(Debug, Default)]
struct HealthState {
    components: HashMap<String, ComponentHealth>,
    completed_ticks: u64,
    consecutive_aborts: u32,
}

/// Health registry for tracking component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
    /// Consecutive aborted ticks before the source is reported unhealthy
    unhealthy_after: u32,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::with_unhealthy_after(5)
    }

    pub fn with_unhealthy_after(unhealthy_after: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(HealthState::default())),
            unhealthy_after: unhealthy_after.max(1),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut state = self.state.write().await;
        state
            .components
            .insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Update component health status
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut state = self.state.write().await;
        state.components.insert(name.to_string(), health);
    }

    /// Fold the outcome of a tick into component health
    pub async fn record_tick(&self, report: &TickReport) {
        let mut state = self.state.write().await;

        let source = if report.aborted {
            state.consecutive_aborts += 1;
            let reason = report
                .abort_reason
                .clone()
                .unwrap_or_else(|| "snapshot unavailable".to_string());
            if state.consecutive_aborts >= self.unhealthy_after {
                ComponentHealth::unhealthy(format!(
                    "{} consecutive ticks aborted: {}",
                    state.consecutive_aborts, reason
                ))
            } else {
                ComponentHealth::degraded(reason)
            }
        } else {
            state.consecutive_aborts = 0;
            state.completed_ticks += 1;
            ComponentHealth::healthy()
        };
        state
            .components
            .insert(components::SNAPSHOT_SOURCE.to_string(), source);

        let reconciler = if report.internal_faults > 0 {
            ComponentHealth::degraded(format!(
                "{} internal consistency fault(s) in last tick",
                report.internal_faults
            ))
        } else {
            ComponentHealth::healthy()
        };
        state
            .components
            .insert(components::RECONCILER.to_string(), reconciler);
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        HealthResponse {
            status: HealthResponse::compute_status(&state.components),
            components: state.components.clone(),
            completed_ticks: state.completed_ticks,
        }
    }

    /// Ready once one tick has completed and the source is not unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let health = self.health().await;

        if health.completed_ticks == 0 {
            ReadinessResponse {
                ready: false,
                reason: Some("No reconciliation tick completed yet".to_string()),
            }
        } else if health.status == ComponentStatus::Unhealthy {
            ReadinessResponse {
                ready: false,
                reason: Some("Snapshot source unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed() -> TickReport {
        TickReport::default()
    }

    fn aborted() -> TickReport {
        TickReport {
            aborted: true,
            abort_reason: Some("Failed to list workloads: connection refused".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
        assert_eq!(health.completed_ticks, 0);
    }

    #[tokio::test]
    async fn test_component_registration() {
        let registry = HealthRegistry::new();
        registry.register(components::SNAPSHOT_SOURCE).await;

        let health = registry.health().await;
        assert_eq!(
            health.components[components::SNAPSHOT_SOURCE].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_aborted_tick_degrades_then_unhealthy() {
        let registry = HealthRegistry::with_unhealthy_after(2);
        registry.record_tick(&aborted()).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.components[components::SNAPSHOT_SOURCE]
            .message
            .as_deref()
            .unwrap()
            .contains("connection refused"));

        registry.record_tick(&aborted()).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);

        registry.record_tick(&completed()).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_internal_fault_degrades_reconciler() {
        let registry = HealthRegistry::new();
        registry
            .record_tick(&TickReport {
                internal_faults: 1,
                ..Default::default()
            })
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::RECONCILER].status,
            ComponentStatus::Degraded
        );
    }

    #[tokio::test]
    async fn test_readiness_requires_completed_tick() {
        let registry = HealthRegistry::new();
        assert!(!registry.readiness().await.ready);

        registry.record_tick(&aborted()).await;
        assert!(!registry.readiness().await.ready);

        registry.record_tick(&completed()).await;
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_readiness_lost_when_unhealthy() {
        let registry = HealthRegistry::with_unhealthy_after(1);
        registry.record_tick(&completed()).await;
        registry.record_tick(&aborted()).await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }
}
