//! HTTP API for health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use podwatch_lib::{ComponentStatus, HealthRegistry};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry) -> Self {
        Self { health_registry }
    }
}

/// Health check response - 200 while the agent can still reconcile, 503 otherwise
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - 200 once a tick has completed
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use podwatch_lib::{AgentMetrics, TickReport};
    use tower::ServiceExt;

    async fn get_status(router: Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    fn aborted() -> TickReport {
        TickReport {
            aborted: true,
            abort_reason: Some("Failed to list pod metrics: 503".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_readyz_waits_for_first_tick() {
        let registry = HealthRegistry::new();
        let state = Arc::new(AppState::new(registry.clone()));

        assert_eq!(
            get_status(create_router(state.clone()), "/readyz").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        registry.record_tick(&TickReport::default()).await;
        assert_eq!(
            get_status(create_router(state), "/readyz").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_healthz_degraded_is_ok() {
        let registry = HealthRegistry::with_unhealthy_after(3);
        registry.record_tick(&aborted()).await;
        let state = Arc::new(AppState::new(registry));

        assert_eq!(get_status(create_router(state), "/healthz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_healthz_unhealthy_returns_503() {
        let registry = HealthRegistry::with_unhealthy_after(1);
        registry.record_tick(&aborted()).await;
        let state = Arc::new(AppState::new(registry));

        assert_eq!(
            get_status(create_router(state), "/healthz").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exposes_tick_metrics() {
        let metrics = AgentMetrics::new();
        metrics.observe_tick(&TickReport::default());
        let state = Arc::new(AppState::new(HealthRegistry::new()));

        let response = create_router(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("podwatch_ticks_total"));
    }
}
