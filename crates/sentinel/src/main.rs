//! Host Sentinel - AI-assisted host monitoring agent
//!
//! Samples host telemetry on a fixed cadence, detects statistical patterns,
//! and produces LLM-backed, falsifiable predictions validated against
//! reality.

use anyhow::Result;
use sentinel_lib::{
    collector::{MonitorConfig, MonitorLoop, ProcfsSource, TelemetrySource},
    dashboard::DashboardClient,
    health::{components, HealthRegistry},
    observability::{SentinelMetrics, StructuredLogger},
    patterns::{DetectorConfig, PatternDetector},
    predictor::PredictionEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod providers;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting host-sentinel");

    // Load configuration
    let config = config::SentinelConfig::load()?;
    info!(host = %config.host_name, "Agent configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::DETECTOR).await;
    health_registry.register(components::ROUTER).await;
    health_registry.register(components::PREDICTOR).await;

    // Initialize metrics and structured logging
    let metrics = SentinelMetrics::new();
    let logger = StructuredLogger::new(&config.host_name);
    logger.log_startup(AGENT_VERSION);

    // Wire the core: source -> detector -> router -> prediction engine
    let source: Arc<dyn TelemetrySource> = Arc::new(ProcfsSource::new());
    let detector = Arc::new(RwLock::new(PatternDetector::new(DetectorConfig::default())));
    let router = Arc::new(providers::build_router(&config));
    let engine = Arc::new(PredictionEngine::new(router.clone()));

    let dashboard = match config.dashboard_url.as_deref() {
        Some(url) => match DashboardClient::new(url) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "Dashboard URL invalid, export disabled");
                None
            }
        },
        None => None,
    };

    let monitor = MonitorLoop::new(
        source,
        detector.clone(),
        engine.clone(),
        dashboard,
        MonitorConfig {
            interval: Duration::from_secs(config.collect_interval_secs),
            prediction_enabled: config.prediction_enabled,
        },
        logger.clone(),
    );

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        detector,
        engine,
        router,
    ));

    // Mark agent as ready after initialization
    health_registry.set_ready(true).await;

    // Start the monitoring loop and the health/metrics server
    let (shutdown_tx, _) = broadcast::channel(1);
    let monitor_handle = tokio::spawn(monitor.run(shutdown_tx.subscribe()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());
    let _ = monitor_handle.await;
    api_handle.abort();

    info!("Shutting down");
    Ok(())
}
