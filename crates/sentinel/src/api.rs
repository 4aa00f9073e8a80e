//! HTTP API for health checks, Prometheus metrics and agent status

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use sentinel_lib::{
    health::{ComponentStatus, HealthRegistry},
    llm::LlmRouter,
    observability::SentinelMetrics,
    patterns::PatternDetector,
    predictor::PredictionEngine,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: SentinelMetrics,
    pub detector: Arc<RwLock<PatternDetector>>,
    pub engine: Arc<PredictionEngine>,
    pub router: Arc<LlmRouter>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: SentinelMetrics,
        detector: Arc<RwLock<PatternDetector>>,
        engine: Arc<PredictionEngine>,
        router: Arc<LlmRouter>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            detector,
            engine,
            router,
        }
    }
}

/// Health check - 200 while at least degraded, 503 once unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check - 200 once initialized and no component has failed
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

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Current patterns, prediction accuracy and router usage as JSON
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let patterns = {
        let mut detector = state.detector.write().await;
        detector.active_patterns(Utc::now())
    };
    let accuracy = state.engine.accuracy().await;
    let pending = state.engine.pending_count().await;
    let recent = state.engine.recent_predictions(10).await;
    let router_stats = state.router.stats();

    Json(json!({
        "patterns": patterns,
        "predictions": {
            "pending": pending,
            "recent": recent,
            "accuracy": accuracy,
        },
        "router": router_stats,
    }))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/status", get(status))
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
