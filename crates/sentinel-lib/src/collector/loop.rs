//! Monitoring loop
//!
//! Drives the whole control loop on a fixed-interval ticker: sample
//! telemetry, feed the pattern detector synchronously, then dispatch
//! prediction and dashboard work as spawned tasks that log their own
//! failures. The loop is the only writer of the detector; spawned tasks
//! only read shared state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

use super::TelemetrySource;
use crate::dashboard::DashboardClient;
use crate::models::TelemetrySnapshot;
use crate::observability::{SentinelMetrics, StructuredLogger};
use crate::patterns::{DetectedPattern, Derivative, PatternDetector};
use crate::predictor::PredictionEngine;

/// Configuration for the monitoring loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Telemetry sampling interval (default: 5 seconds)
    pub interval: Duration,
    /// Whether to generate predictions when patterns are active
    pub prediction_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            prediction_enabled: true,
        }
    }
}

/// The periodic monitoring loop
pub struct MonitorLoop {
    source: Arc<dyn TelemetrySource>,
    detector: Arc<RwLock<PatternDetector>>,
    engine: Arc<PredictionEngine>,
    dashboard: Option<Arc<DashboardClient>>,
    config: MonitorConfig,
    metrics: SentinelMetrics,
    logger: StructuredLogger,
}

impl MonitorLoop {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        detector: Arc<RwLock<PatternDetector>>,
        engine: Arc<PredictionEngine>,
        dashboard: Option<Arc<DashboardClient>>,
        config: MonitorConfig,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            source,
            detector,
            engine,
            dashboard,
            config,
            metrics: SentinelMetrics::new(),
            logger,
        }
    }

    /// Run until the shutdown channel fires
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            prediction_enabled = self.config.prediction_enabled,
            "Starting monitoring loop"
        );

        let mut ticker = interval(self.config.interval);
        let mut tick_count = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                    tick_count += 1;

                    if tick_count % 12 == 0 {
                        // Every minute at the 5s default interval
                        let detector = self.detector.read().await;
                        debug!(
                            ticks = tick_count,
                            snapshots = detector.snapshot_count(),
                            "Monitoring loop stats"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down monitoring loop");
                    break;
                }
            }
        }
    }

    /// One monitoring tick: sample, detect, dispatch
    async fn tick(&self) {
        let start = Instant::now();

        let snapshot = match self.source.sample().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to sample telemetry");
                self.metrics.inc_collection_errors();
                return;
            }
        };

        let (patterns, latest_rate) = {
            let mut detector = self.detector.write().await;
            detector.push_snapshot(snapshot.clone());
            let patterns = detector.active_patterns(Utc::now());
            let latest_rate = detector.latest_derivative().cloned();
            self.metrics
                .set_snapshots_buffered(detector.snapshot_count() as i64);
            (patterns, latest_rate)
        };

        self.metrics.set_patterns_active(patterns.len() as i64);
        for pattern in &patterns {
            self.logger.log_pattern(
                &pattern.kind.to_string(),
                pattern.confidence,
                pattern.frequency,
                &pattern.evidence,
            );
        }

        if self.config.prediction_enabled {
            self.spawn_prediction_task(snapshot.clone(), patterns.clone(), latest_rate);
        }
        self.spawn_dashboard_export(snapshot, patterns);

        self.metrics
            .observe_tick_latency(start.elapsed().as_secs_f64());
    }

    /// Validate due predictions and, when patterns are active, make a new
    /// one. Runs detached so a slow provider cannot stall the tick.
    fn spawn_prediction_task(
        &self,
        snapshot: TelemetrySnapshot,
        patterns: Vec<DetectedPattern>,
        latest_rate: Option<Derivative>,
    ) {
        let engine = self.engine.clone();
        let dashboard = self.dashboard.clone();
        let metrics = self.metrics.clone();
        let logger = self.logger.clone();

        tokio::spawn(async move {
            let validated = engine.validate_pending(&snapshot, Utc::now()).await;
            for prediction in &validated {
                metrics.inc_predictions_validated();
                let correct = prediction.was_correct.unwrap_or(false);
                if correct {
                    metrics.inc_predictions_correct();
                }
                logger.log_validation(
                    &prediction.id,
                    &prediction.kind.to_string(),
                    correct,
                    prediction.actual_result.as_deref().unwrap_or(""),
                );
            }

            // The engine requires at least one active pattern
            if patterns.is_empty() {
                return;
            }

            match engine
                .make_prediction(&snapshot, &patterns, latest_rate.as_ref())
                .await
            {
                Ok(prediction) => {
                    metrics.inc_predictions_generated();
                    logger.log_prediction(
                        &prediction.id,
                        &prediction.kind.to_string(),
                        prediction.confidence,
                        &prediction.validate_at.to_rfc3339(),
                    );

                    if let Some(dashboard) = dashboard {
                        if let Err(e) = dashboard.post_prediction(&prediction).await {
                            logger.log_export_failure("predictions", &e.to_string());
                        }
                    }
                }
                Err(e) => {
                    metrics.inc_prediction_errors();
                    warn!(error = %e, "Prediction failed");
                }
            }
        });
    }

    /// Export the snapshot and active patterns to the dashboard, detached
    fn spawn_dashboard_export(&self, snapshot: TelemetrySnapshot, patterns: Vec<DetectedPattern>) {
        let Some(dashboard) = self.dashboard.clone() else {
            return;
        };
        let logger = self.logger.clone();

        tokio::spawn(async move {
            if let Err(e) = dashboard.post_snapshot(&snapshot).await {
                logger.log_export_failure("telemetry", &e.to_string());
            }
            if !patterns.is_empty() {
                if let Err(e) = dashboard.post_patterns(&patterns).await {
                    logger.log_export_failure("patterns", &e.to_string());
                }
            }
        });
    }
}
