//! Core data models for the lifecycle agent

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse lifecycle phase of a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl WorkloadPhase {
    /// Parse a phase as reported by the API server.
    ///
    /// Missing or unrecognised phases map to `Unknown`.
    pub fn from_api(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => WorkloadPhase::Pending,
            Some("Running") => WorkloadPhase::Running,
            Some("Succeeded") => WorkloadPhase::Succeeded,
            Some("Failed") => WorkloadPhase::Failed,
            _ => WorkloadPhase::Unknown,
        }
    }

    /// Succeeded and Failed are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkloadPhase::Succeeded | WorkloadPhase::Failed)
    }
}

impl fmt::Display for WorkloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadPhase::Pending => write!(f, "Pending"),
            WorkloadPhase::Running => write!(f, "Running"),
            WorkloadPhase::Succeeded => write!(f, "Succeeded"),
            WorkloadPhase::Failed => write!(f, "Failed"),
            WorkloadPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One entry of a workload listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadObservation {
    pub name: String,
    pub uid: String,
    pub phase: WorkloadPhase,
}

impl WorkloadObservation {
    pub fn new(name: impl Into<String>, uid: impl Into<String>, phase: WorkloadPhase) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
            phase,
        }
    }
}

/// Tracked state of a single workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    pub name: String,
    /// Audit only, never compared
    pub uid: String,
    pub status: WorkloadPhase,
    /// Observation time of the current status
    pub last_change: DateTime<Utc>,
}

impl WorkloadRecord {
    pub fn observed(observation: &WorkloadObservation, now: DateTime<Utc>) -> Self {
        Self {
            name: observation.name.clone(),
            uid: observation.uid.clone(),
            status: observation.phase,
            last_change: observation_time(now),
        }
    }
}

/// Truncate a clock reading to the precision the tracker stores.
pub fn observation_time(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(6)
}

/// Undecoded metrics item for one pod, as listed by the metrics API
#[derive(Debug, Clone, PartialEq)]
pub struct RawPodMetrics {
    pub name: String,
    pub namespace: String,
    pub payload: serde_json::Value,
}

/// Resource usage of one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu: String,
    pub memory: String,
}

/// Per-container usage inside a metrics sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    pub usage: ResourceUsage,
}

/// Decoded metrics payload of a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    pub containers: Vec<ContainerUsage>,
}

/// A decoded metrics sample, logged as-is when it is newer than the last one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodMetrics {
    pub name: String,
    pub namespace: String,
    #[serde(flatten)]
    pub payload: MetricsPayload,
}

impl PodMetrics {
    pub fn decode(raw: &RawPodMetrics) -> Result<Self, serde_json::Error> {
        let payload = MetricsPayload::deserialize(&raw.payload)?;
        Ok(Self {
            name: raw.name.clone(),
            namespace: raw.namespace.clone(),
            payload,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.payload.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_phase_from_api() {
        assert_eq!(WorkloadPhase::from_api(Some("Running")), WorkloadPhase::Running);
        assert_eq!(WorkloadPhase::from_api(Some("Evicted")), WorkloadPhase::Unknown);
        assert_eq!(WorkloadPhase::from_api(None), WorkloadPhase::Unknown);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(WorkloadPhase::Succeeded.is_terminal());
        assert!(WorkloadPhase::Failed.is_terminal());
        assert!(!WorkloadPhase::Running.is_terminal());
        assert!(!WorkloadPhase::Unknown.is_terminal());
    }

    #[test]
    fn test_observation_time_truncates_to_micros() {
        let now = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(observation_time(now).timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_decode_pod_metrics() {
        let raw = RawPodMetrics {
            name: "web-0".to_string(),
            namespace: "default".to_string(),
            payload: json!({
                "timestamp": "2024-05-01T10:00:00Z",
                "window": "30s",
                "containers": [
                    {"name": "app", "usage": {"cpu": "12m", "memory": "40Mi"}}
                ]
            }),
        };

        let metrics = PodMetrics::decode(&raw).unwrap();
        assert_eq!(metrics.name, "web-0");
        assert_eq!(metrics.payload.window.as_deref(), Some("30s"));
        assert_eq!(metrics.payload.containers[0].usage.cpu, "12m");
        assert_eq!(
            metrics.timestamp(),
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_decode_rejects_missing_timestamp() {
        let raw = RawPodMetrics {
            name: "web-0".to_string(),
            namespace: "default".to_string(),
            payload: json!({"containers": []}),
        };
        assert!(PodMetrics::decode(&raw).is_err());
    }
}
