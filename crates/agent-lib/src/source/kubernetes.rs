//! Kubernetes API snapshot source
//!
//! Lists `v1/Pod` objects and `metrics.k8s.io/v1beta1` PodMetrics in a single
//! namespace.

use super::SnapshotSource;
use crate::error::Fault;
use crate::models::{RawPodMetrics, WorkloadObservation, WorkloadPhase};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use tracing::{debug, info, warn};

const METRICS_GROUP: &str = "metrics.k8s.io";
const METRICS_VERSION: &str = "v1beta1";

pub struct KubeSnapshotSource {
    pods: Api<Pod>,
    pod_metrics: Api<DynamicObject>,
    namespace: String,
}

impl KubeSnapshotSource {
    /// Create a source from an existing client
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let resource = metrics_resource();

        Self {
            pods: Api::namespaced(client.clone(), &namespace),
            pod_metrics: Api::namespaced_with(client, &namespace, &resource),
            namespace,
        }
    }

    /// Connect using an explicit kubeconfig, or in-cluster / default config
    pub async fn connect(kubeconfig: Option<&Path>, namespace: impl Into<String>) -> Result<Self> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("Invalid kubeconfig")?
            }
            None => Config::infer()
                .await
                .context("Failed to infer cluster configuration")?,
        };

        info!(cluster_url = %config.cluster_url, "Connecting to Kubernetes API");
        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;

        Ok(Self::new(client, namespace))
    }
}

#[async_trait]
impl SnapshotSource for KubeSnapshotSource {
    async fn list_workloads(&self) -> Result<Vec<WorkloadObservation>, Fault> {
        let list = self
            .pods
            .list(&ListParams::default())
            .await
            .map_err(|e| Fault::WorkloadListing {
                reason: e.to_string(),
            })?;

        let workloads: Vec<_> = list.items.iter().filter_map(observe_pod).collect();
        debug!(count = workloads.len(), "Listed pods");
        Ok(workloads)
    }

    async fn list_metrics(&self) -> Result<Vec<RawPodMetrics>, Fault> {
        let list = self
            .pod_metrics
            .list(&ListParams::default())
            .await
            .map_err(|e| Fault::MetricsListing {
                reason: e.to_string(),
            })?;

        let metrics: Vec<_> = list
            .items
            .into_iter()
            .map(|item| raw_metrics(item, &self.namespace))
            .collect();

        debug!(count = metrics.len(), "Listed pod metrics");
        Ok(metrics)
    }

    async fn fetch_detail(&self, name: &str) -> Result<String, Fault> {
        let pod = self.pods.get(name).await.map_err(|e| Fault::DetailFetch {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        serde_json::to_string(&pod).map_err(|e| Fault::DetailFetch {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

fn metrics_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(METRICS_GROUP, METRICS_VERSION, "PodMetrics");
    ApiResource::from_gvk_with_plural(&gvk, "pods")
}

/// Reduce a pod object to the fields the tracker needs
fn observe_pod(pod: &Pod) -> Option<WorkloadObservation> {
    let Some(name) = pod.metadata.name.clone() else {
        warn!("Skipping pod without a name");
        return None;
    };
    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());

    Some(WorkloadObservation {
        name,
        uid: pod.metadata.uid.clone().unwrap_or_default(),
        phase: WorkloadPhase::from_api(phase),
    })
}

/// Keep the metrics payload undecoded; an unnamed item is passed on with an
/// empty name and reported by the digest
fn raw_metrics(item: DynamicObject, namespace: &str) -> RawPodMetrics {
    RawPodMetrics {
        name: item.metadata.name.unwrap_or_default(),
        namespace: item
            .metadata
            .namespace
            .unwrap_or_else(|| namespace.to_string()),
        payload: item.data,
    }
}
