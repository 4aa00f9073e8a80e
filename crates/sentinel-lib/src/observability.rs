//! Observability infrastructure for the sentinel agent
//!
//! Provides:
//! - Prometheus metrics (tick latency, LLM latency, pattern and prediction
//!   counters)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for tick latency (seconds)
const TICK_BUCKETS: &[f64] = &[0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Histogram buckets for LLM request latency (seconds)
const LLM_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SentinelMetricsInner> = OnceLock::new();

struct SentinelMetricsInner {
    tick_latency_seconds: Histogram,
    llm_request_latency_seconds: Histogram,
    snapshots_buffered: IntGauge,
    patterns_active: IntGauge,
    patterns_detected_total: IntCounter,
    llm_requests_total: IntCounter,
    llm_fallbacks_total: IntCounter,
    predictions_generated_total: IntCounter,
    predictions_validated_total: IntCounter,
    predictions_correct_total: IntCounter,
    collection_errors_total: IntCounter,
    prediction_errors_total: IntCounter,
}

impl SentinelMetricsInner {
    fn new() -> Self {
        Self {
            tick_latency_seconds: register_histogram!(
                "host_sentinel_tick_latency_seconds",
                "Time spent per monitoring tick (sampling plus detection)",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            llm_request_latency_seconds: register_histogram!(
                "host_sentinel_llm_request_latency_seconds",
                "Wall-clock time of routed LLM requests including fallback",
                LLM_BUCKETS.to_vec()
            )
            .expect("Failed to register llm_request_latency_seconds"),

            snapshots_buffered: register_int_gauge!(
                "host_sentinel_snapshots_buffered",
                "Number of telemetry snapshots in the ring buffer"
            )
            .expect("Failed to register snapshots_buffered"),

            patterns_active: register_int_gauge!(
                "host_sentinel_patterns_active",
                "Number of currently active detected patterns"
            )
            .expect("Failed to register patterns_active"),

            patterns_detected_total: register_int_counter!(
                "host_sentinel_patterns_detected_total",
                "Total pattern detections, including re-detections"
            )
            .expect("Failed to register patterns_detected_total"),

            llm_requests_total: register_int_counter!(
                "host_sentinel_llm_requests_total",
                "Total LLM requests routed"
            )
            .expect("Failed to register llm_requests_total"),

            llm_fallbacks_total: register_int_counter!(
                "host_sentinel_llm_fallbacks_total",
                "LLM requests that needed the fallback chain"
            )
            .expect("Failed to register llm_fallbacks_total"),

            predictions_generated_total: register_int_counter!(
                "host_sentinel_predictions_generated_total",
                "Total predictions generated"
            )
            .expect("Failed to register predictions_generated_total"),

            predictions_validated_total: register_int_counter!(
                "host_sentinel_predictions_validated_total",
                "Total predictions validated against telemetry"
            )
            .expect("Failed to register predictions_validated_total"),

            predictions_correct_total: register_int_counter!(
                "host_sentinel_predictions_correct_total",
                "Validated predictions that were correct"
            )
            .expect("Failed to register predictions_correct_total"),

            collection_errors_total: register_int_counter!(
                "host_sentinel_collection_errors_total",
                "Telemetry sampling failures"
            )
            .expect("Failed to register collection_errors_total"),

            prediction_errors_total: register_int_counter!(
                "host_sentinel_prediction_errors_total",
                "Prediction generation failures"
            )
            .expect("Failed to register prediction_errors_total"),
        }
    }
}

/// Metrics handle for Prometheus exposition.
///
/// Lightweight handle to the global instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct SentinelMetrics {
    _private: (),
}

impl Default for SentinelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SentinelMetrics {
    /// Create a metrics handle, initializing the global registry on first use
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SentinelMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SentinelMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_tick_latency(&self, duration_secs: f64) {
        self.inner().tick_latency_seconds.observe(duration_secs);
    }

    pub fn observe_llm_latency(&self, duration_secs: f64) {
        self.inner()
            .llm_request_latency_seconds
            .observe(duration_secs);
    }

    pub fn set_snapshots_buffered(&self, count: i64) {
        self.inner().snapshots_buffered.set(count);
    }

    pub fn set_patterns_active(&self, count: i64) {
        self.inner().patterns_active.set(count);
    }

    pub fn inc_patterns_detected(&self) {
        self.inner().patterns_detected_total.inc();
    }

    pub fn inc_llm_requests(&self) {
        self.inner().llm_requests_total.inc();
    }

    pub fn inc_llm_fallbacks(&self) {
        self.inner().llm_fallbacks_total.inc();
    }

    pub fn inc_predictions_generated(&self) {
        self.inner().predictions_generated_total.inc();
    }

    pub fn inc_predictions_validated(&self) {
        self.inner().predictions_validated_total.inc();
    }

    pub fn inc_predictions_correct(&self) {
        self.inner().predictions_correct_total.inc();
    }

    pub fn inc_collection_errors(&self) {
        self.inner().collection_errors_total.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors_total.inc();
    }
}

/// Structured logger for significant agent events.
///
/// Keeps the `event = ...` field convention consistent across the
/// monitoring loop, router and prediction engine.
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "agent_started",
            host = %self.host,
            agent_version = %version,
            "Host sentinel started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            host = %self.host,
            reason = %reason,
            "Host sentinel shutting down"
        );
    }

    /// Log a pattern detection or re-detection
    pub fn log_pattern(&self, kind: &str, confidence: f64, frequency: u32, evidence: &[String]) {
        info!(
            event = "pattern_detected",
            host = %self.host,
            pattern = %kind,
            confidence = confidence,
            frequency = frequency,
            evidence = ?evidence,
            "Pattern detected"
        );
    }

    /// Log a generated prediction
    pub fn log_prediction(&self, id: &str, kind: &str, confidence: f64, validate_at: &str) {
        info!(
            event = "prediction_generated",
            host = %self.host,
            prediction_id = %id,
            kind = %kind,
            confidence = confidence,
            validate_at = %validate_at,
            "Generated prediction"
        );
    }

    /// Log a validated prediction outcome
    pub fn log_validation(&self, id: &str, kind: &str, correct: bool, actual: &str) {
        if correct {
            info!(
                event = "prediction_validated",
                host = %self.host,
                prediction_id = %id,
                kind = %kind,
                correct = true,
                "Prediction was correct"
            );
        } else {
            warn!(
                event = "prediction_validated",
                host = %self.host,
                prediction_id = %id,
                kind = %kind,
                correct = false,
                actual = %actual,
                "Prediction missed"
            );
        }
    }

    /// Log a dashboard export failure (side channel, not fatal)
    pub fn log_export_failure(&self, target: &str, error: &str) {
        warn!(
            event = "dashboard_export_failed",
            host = %self.host,
            target = %target,
            error = %error,
            "Failed to export to dashboard"
        );
    }
}
