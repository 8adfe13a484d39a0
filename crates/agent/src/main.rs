//! Pod lifecycle agent
//!
//! Polls the workload listing and the metrics listing of one namespace,
//! writes lifecycle events to a structured log and exposes health and
//! Prometheus metrics over HTTP.

use anyhow::Result;
use clap::Parser;
use podwatch_lib::{
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    KubeSnapshotSource, TickDriverBuilder,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

mod api;
mod config;
mod logging;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "podwatch-agent")]
#[command(about = "Observe pod lifecycle transitions and resource usage", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a kubeconfig file (in-cluster or default config otherwise)
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Directory for the event log
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Namespace to observe
    #[arg(short, long)]
    namespace: Option<String>,

    /// Optional configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::AgentConfig::load(cli.config.as_deref())?.with_overrides(
        cli.kubeconfig,
        cli.log_dir,
        cli.namespace,
    );

    let log_path = logging::init(&config.log_dir, config.log_max_files)?;
    info!(log_path = %log_path.display(), "Writing event log");
    info!(
        namespace = %config.namespace,
        poll_interval_secs = config.poll_interval_secs,
        "Agent configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SNAPSHOT_SOURCE).await;
    health_registry.register(components::RECONCILER).await;

    let metrics = AgentMetrics::new();

    let logger = StructuredLogger::new(config.namespace.clone());
    logger.log_startup(AGENT_VERSION, &config.log_dir.display().to_string());

    let source =
        KubeSnapshotSource::connect(config.kubeconfig.as_deref(), config.namespace.clone()).await?;

    let driver_config = config.driver_config()?;
    let driver = TickDriverBuilder::new()
        .source(Arc::new(source))
        .sink(Arc::new(logger.clone()))
        .health(health_registry.clone())
        .metrics(metrics)
        .interval(driver_config.interval)
        .archive_threshold(driver_config.reconciler.archive_threshold)
        .archive_retention(driver_config.reconciler.archive_retention)
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let driver_handle = tokio::spawn(driver.run(shutdown_rx));

    let app_state = Arc::new(api::AppState::new(health_registry));
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server stopped");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());

    let engine = driver_handle.await?;
    info!(
        active = engine.active().len(),
        retired = engine.retired().len(),
        "Shutting down"
    );

    Ok(())
}
