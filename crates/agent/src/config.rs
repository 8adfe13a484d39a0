//! Agent configuration

use anyhow::{Context, Result};
use podwatch_lib::{DriverConfig, ReconcilerConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Namespace whose pods are observed
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Reconciliation interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Retired archive size that triggers cleanup
    #[serde(default = "default_archive_threshold")]
    pub archive_threshold: usize,

    /// Retired workloads younger than this survive cleanup
    #[serde(default = "default_archive_retention")]
    pub archive_retention_secs: u64,

    /// Directory receiving the event log
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Daily event log files kept before the oldest is removed
    #[serde(default = "default_log_max_files")]
    pub log_max_files: usize,

    /// Explicit kubeconfig; in-cluster or default config otherwise
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_poll_interval() -> u64 {
    15
}

fn default_archive_threshold() -> usize {
    1000
}

fn default_archive_retention() -> u64 {
    24 * 60 * 60
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/log")
}

fn default_log_max_files() -> usize {
    7
}

impl AgentConfig {
    /// Load configuration from an optional file and `PODWATCH_*` environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder
            .add_source(config::Environment::with_prefix("PODWATCH"))
            .build()
            .context("Failed to read configuration")?;

        let config: AgentConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn with_overrides(
        mut self,
        kubeconfig: Option<PathBuf>,
        log_dir: Option<PathBuf>,
        namespace: Option<String>,
    ) -> Self {
        if kubeconfig.is_some() {
            self.kubeconfig = kubeconfig;
        }
        if let Some(dir) = log_dir {
            self.log_dir = dir;
        }
        if let Some(ns) = namespace {
            self.namespace = ns;
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        if self.log_max_files == 0 {
            anyhow::bail!("log_max_files must be greater than zero");
        }
        if self.archive_retention_secs == 0 {
            anyhow::bail!("archive_retention_secs must be greater than zero");
        }
        self.driver_config().map(|_| ())
    }

    /// Tick driver settings derived from this configuration
    pub fn driver_config(&self) -> Result<DriverConfig> {
        let archive_retention = i64::try_from(self.archive_retention_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .context("archive_retention_secs is out of range")?;

        Ok(DriverConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            reconciler: ReconcilerConfig {
                archive_threshold: self.archive_threshold,
                archive_retention,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn empty() -> AgentConfig {
        let config = config::Config::builder().build().unwrap();
        config.try_deserialize().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = empty();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.archive_threshold, 1000);
        assert_eq!(config.archive_retention_secs, 86400);
        assert_eq!(config.log_dir, PathBuf::from("/log"));
        assert_eq!(config.log_max_files, 7);
        assert!(config.kubeconfig.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "namespace = \"batch\"\npoll_interval_secs = 30\narchive_threshold = 50").unwrap();

        let config = AgentConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.namespace, "batch");
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.archive_threshold, 50);
        assert_eq!(config.api_port, 8080);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "poll_interval_secs = 0").unwrap();

        assert!(AgentConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = empty().with_overrides(
            Some(PathBuf::from("/home/ops/.kube/config")),
            Some(PathBuf::from("/var/log/podwatch")),
            None,
        );
        assert_eq!(config.log_dir, PathBuf::from("/var/log/podwatch"));
        assert_eq!(config.namespace, "default");
        assert!(config.kubeconfig.is_some());
    }

    #[test]
    fn test_driver_config() {
        let driver = empty().driver_config().unwrap();
        assert_eq!(driver.interval, Duration::from_secs(15));
        assert_eq!(driver.reconciler.archive_retention.num_hours(), 24);
        assert_eq!(driver.reconciler.archive_threshold, 1000);
    }
}
