//! Prediction generation and validation

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::llm::{LlmError, LlmRequest, LlmRouter};
use crate::models::TelemetrySnapshot;
use crate::patterns::{DetectedPattern, Derivative};

/// Permanent prediction history capacity
const HISTORY_CAPACITY: usize = 100;

/// Max tokens requested for a prediction call
const PREDICTION_MAX_TOKENS: u32 = 500;

/// Low temperature for consistent predictions
const PREDICTION_TEMPERATURE: f64 = 0.3;

/// What a prediction claims will happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    MemoryExhaustion,
    CpuOverload,
    CrashLikely,
    PerformanceDegradation,
    NormalOperation,
    /// Anything the model invented; always validates incorrect
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PredictionKind::MemoryExhaustion => "memory_exhaustion",
            PredictionKind::CpuOverload => "cpu_overload",
            PredictionKind::CrashLikely => "crash_likely",
            PredictionKind::PerformanceDegradation => "performance_degradation",
            PredictionKind::NormalOperation => "normal_operation",
            PredictionKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Coarse future window at which a prediction becomes checkable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeHorizon {
    #[serde(rename = "5_minutes")]
    FiveMinutes,
    #[serde(rename = "30_minutes")]
    ThirtyMinutes,
    #[serde(rename = "1_hour")]
    OneHour,
    /// Missing or unrecognized horizon; validated after a 10-minute default
    #[default]
    #[serde(other, rename = "unspecified")]
    Unspecified,
}

impl TimeHorizon {
    /// Offset added to creation time to get the validation deadline
    pub fn offset(&self) -> chrono::Duration {
        match self {
            TimeHorizon::FiveMinutes => chrono::Duration::minutes(5),
            TimeHorizon::ThirtyMinutes => chrono::Duration::minutes(30),
            TimeHorizon::OneHour => chrono::Duration::hours(1),
            TimeHorizon::Unspecified => chrono::Duration::minutes(10),
        }
    }
}

/// A falsifiable claim about future system state
#[derive(Debug, Clone, Serialize)]
pub struct SimplePrediction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PredictionKind,
    pub description: String,
    /// Model-reported confidence, coerced into (0, 1]
    pub confidence: f64,
    pub time_horizon: TimeHorizon,
    pub created_at: DateTime<Utc>,
    pub validate_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_result: Option<String>,
}

/// Shape the LLM is asked to return
#[derive(Debug, Deserialize)]
struct RawPrediction {
    #[serde(rename = "type", default)]
    kind: Option<PredictionKind>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    time_horizon: TimeHorizon,
}

/// Errors from prediction generation
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("LLM routing failed")]
    Routing(#[from] LlmError),

    #[error("prediction response was not valid JSON")]
    Parse(#[source] serde_json::Error),

    #[error("prediction response missing type or description")]
    MissingFields,
}

/// Accuracy for one prediction kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct KindAccuracy {
    pub total: usize,
    pub correct: usize,
    pub accuracy_percent: f64,
}

/// Aggregate accuracy over validated predictions
#[derive(Debug, Clone, Default, Serialize)]
pub struct PredictionAccuracy {
    pub total_predictions: usize,
    pub validated_count: usize,
    pub correct_count: usize,
    pub accuracy_percent: f64,
    pub by_kind: HashMap<String, KindAccuracy>,
}

/// Generates and validates predictions via the LLM router
pub struct PredictionEngine {
    router: Arc<LlmRouter>,
    history: RwLock<VecDeque<SimplePrediction>>,
    pending: RwLock<Vec<SimplePrediction>>,
}

impl PredictionEngine {
    pub fn new(router: Arc<LlmRouter>) -> Self {
        Self {
            router,
            history: RwLock::new(VecDeque::new()),
            pending: RwLock::new(Vec::new()),
        }
    }

    /// Generate one prediction from current telemetry and active patterns.
    ///
    /// Callers must check for active patterns first; invoking this with an
    /// empty pattern set is a caller error (the prompt would carry no
    /// evidence), not something the engine guards against.
    pub async fn make_prediction(
        &self,
        telemetry: &TelemetrySnapshot,
        patterns: &[DetectedPattern],
        latest_rate: Option<&Derivative>,
    ) -> Result<SimplePrediction, PredictionError> {
        let prompt = build_prediction_prompt(telemetry, patterns, latest_rate);

        let request = LlmRequest {
            task_type: "prediction".to_string(),
            prompt,
            max_tokens: PREDICTION_MAX_TOKENS,
            temperature: PREDICTION_TEMPERATURE,
            ..Default::default()
        };

        let response = self.router.route_request(request).await?;
        let raw = parse_prediction(&response.content)?;

        let (Some(kind), Some(description)) = (raw.kind, raw.description) else {
            return Err(PredictionError::MissingFields);
        };
        if description.is_empty() {
            return Err(PredictionError::MissingFields);
        }

        let confidence = if raw.confidence <= 0.0 || raw.confidence > 1.0 {
            0.7
        } else {
            raw.confidence
        };

        let now = Utc::now();
        let prediction = SimplePrediction {
            id: format!("pred_{}", now.timestamp_millis()),
            kind,
            description,
            confidence,
            time_horizon: raw.time_horizon,
            created_at: now,
            validate_at: now + raw.time_horizon.offset(),
            was_correct: None,
            actual_result: None,
        };

        debug!(
            id = %prediction.id,
            kind = %prediction.kind,
            confidence = prediction.confidence,
            "Generated prediction"
        );

        self.push_history(prediction.clone()).await;
        self.pending.write().await.push(prediction.clone());

        Ok(prediction)
    }

    /// Validate pending predictions whose deadline has passed.
    ///
    /// Due entries leave the pending queue and are annotated in the history;
    /// the newly validated predictions are returned. Entries not yet due
    /// stay queued.
    pub async fn validate_pending(
        &self,
        telemetry: &TelemetrySnapshot,
        now: DateTime<Utc>,
    ) -> Vec<SimplePrediction> {
        let due: Vec<SimplePrediction> = {
            let mut pending = self.pending.write().await;
            let (ready, waiting): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|p| now > p.validate_at);
            *pending = waiting;
            ready
        };

        if due.is_empty() {
            return Vec::new();
        }

        let mut validated = Vec::with_capacity(due.len());
        let mut history = self.history.write().await;

        for mut prediction in due {
            let correct = check_prediction(prediction.kind, telemetry);
            let actual = if correct {
                "Prediction was correct".to_string()
            } else {
                describe_actual(prediction.kind, telemetry)
            };

            prediction.was_correct = Some(correct);
            prediction.actual_result = Some(actual.clone());

            if let Some(entry) = history.iter_mut().find(|p| p.id == prediction.id) {
                entry.was_correct = Some(correct);
                entry.actual_result = Some(actual);
            }

            validated.push(prediction);
        }

        validated
    }

    /// Aggregate accuracy over the validated history
    pub async fn accuracy(&self) -> PredictionAccuracy {
        let history = self.history.read().await;

        let mut accuracy = PredictionAccuracy {
            total_predictions: history.len(),
            ..Default::default()
        };

        for prediction in history.iter() {
            let Some(correct) = prediction.was_correct else {
                continue;
            };
            accuracy.validated_count += 1;
            if correct {
                accuracy.correct_count += 1;
            }

            let entry = accuracy
                .by_kind
                .entry(prediction.kind.to_string())
                .or_default();
            entry.total += 1;
            if correct {
                entry.correct += 1;
            }
        }

        if accuracy.validated_count > 0 {
            accuracy.accuracy_percent =
                accuracy.correct_count as f64 / accuracy.validated_count as f64 * 100.0;
        }
        for entry in accuracy.by_kind.values_mut() {
            if entry.total > 0 {
                entry.accuracy_percent = entry.correct as f64 / entry.total as f64 * 100.0;
            }
        }

        accuracy
    }

    /// Predictions still waiting for their horizon to pass
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// The most recent `count` predictions, oldest first
    pub async fn recent_predictions(&self, count: usize) -> Vec<SimplePrediction> {
        let history = self.history.read().await;
        let skip = history.len().saturating_sub(count);
        history.iter().skip(skip).cloned().collect()
    }

    async fn push_history(&self, prediction: SimplePrediction) {
        let mut history = self.history.write().await;
        history.push_back(prediction);
        while history.len() > HISTORY_CAPACITY {
            history.pop_front();
        }
    }
}

/// Extract a structured prediction from raw LLM output.
///
/// Tries the whole body as JSON first; failing that, retries on the
/// substring between the first `{` and the last `}`.
fn parse_prediction(content: &str) -> Result<RawPrediction, PredictionError> {
    match serde_json::from_str(content) {
        Ok(raw) => Ok(raw),
        Err(first_err) => {
            let start = content.find('{');
            let end = content.rfind('}');
            if let (Some(start), Some(end)) = (start, end) {
                if end > start {
                    return serde_json::from_str(&content[start..=end])
                        .map_err(PredictionError::Parse);
                }
            }
            Err(PredictionError::Parse(first_err))
        }
    }
}

/// Fixed per-kind validation rules; unknown kinds fail closed
fn check_prediction(kind: PredictionKind, telemetry: &TelemetrySnapshot) -> bool {
    match kind {
        PredictionKind::MemoryExhaustion => telemetry.memory_percent() > 90.0,
        PredictionKind::CpuOverload => {
            telemetry.cpu.usage_percent > 95.0
                || telemetry.cpu.load_avg_1m > telemetry.cpu.cores as f64 * 1.5
        }
        PredictionKind::PerformanceDegradation => {
            telemetry.cpu.load_avg_5m > telemetry.cpu.cores as f64
        }
        PredictionKind::NormalOperation => {
            telemetry.cpu.usage_percent < 80.0 && telemetry.memory_percent() < 80.0
        }
        PredictionKind::CrashLikely | PredictionKind::Unknown => false,
    }
}

/// Describe what actually happened when a prediction missed
fn describe_actual(kind: PredictionKind, telemetry: &TelemetrySnapshot) -> String {
    match kind {
        PredictionKind::MemoryExhaustion => format!(
            "Memory at {:.1}% (not exhausted)",
            telemetry.memory_percent()
        ),
        PredictionKind::CpuOverload => format!(
            "CPU at {:.1}%, load {:.2} (not overloaded)",
            telemetry.cpu.usage_percent, telemetry.cpu.load_avg_1m
        ),
        _ => "System operating normally".to_string(),
    }
}

fn build_prediction_prompt(
    telemetry: &TelemetrySnapshot,
    patterns: &[DetectedPattern],
    latest_rate: Option<&Derivative>,
) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are a system performance predictor. Make ONE specific, testable prediction based on current data.\n"
    );
    let _ = writeln!(prompt, "CURRENT SYSTEM STATE:");
    let _ = writeln!(
        prompt,
        "- CPU: {:.1}% (Load: {:.2}, {:.2}, {:.2})",
        telemetry.cpu.usage_percent,
        telemetry.cpu.load_avg_1m,
        telemetry.cpu.load_avg_5m,
        telemetry.cpu.load_avg_15m
    );
    let _ = writeln!(
        prompt,
        "- Memory: {} MB used of {} MB ({:.1}%)",
        telemetry.memory.used_mb,
        telemetry.memory.total_mb,
        telemetry.memory_percent()
    );
    let _ = writeln!(
        prompt,
        "- Network: {} active connections\n",
        telemetry.network.active_connections
    );

    let _ = writeln!(prompt, "DETECTED PATTERNS:");
    for pattern in patterns {
        let _ = writeln!(
            prompt,
            "- {} (confidence: {:.0}%, seen {} times)",
            pattern.kind,
            pattern.confidence * 100.0,
            pattern.frequency
        );
    }

    if let Some(rate) = latest_rate {
        let _ = writeln!(prompt, "\nRECENT CHANGES:");
        let _ = writeln!(prompt, "- CPU change: {:.1}% per minute", rate.cpu_per_min);
        let _ = writeln!(
            prompt,
            "- Memory change: {:.1} MB per minute",
            rate.memory_mb_per_min
        );
    }

    prompt.push_str(
        r#"
Make a SPECIFIC prediction in this JSON format:
{
  "type": "memory_exhaustion|cpu_overload|crash_likely|performance_degradation|normal_operation",
  "description": "Specific description of what will happen",
  "confidence": 0.75,
  "time_horizon": "5_minutes|30_minutes|1_hour"
}

Rules:
- Be specific: "Memory will exceed 90% in 30 minutes" not "Memory might increase"
- Use detected patterns as evidence
- Only predict things we can measure
- Confidence should reflect uncertainty (0.5-0.95)

Respond with ONLY valid JSON."#,
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmProvider, ProviderProtocol, RoutingRule};
    use crate::models::{CpuMetrics, MemoryMetrics, NetworkMetrics};
    use crate::patterns::PatternKind;
    use chrono::TimeZone;
    use std::time::Duration;

    fn telemetry(cpu: f64, mem_percent: f64, load1: f64, load5: f64) -> TelemetrySnapshot {
        TelemetrySnapshot {
            cpu: CpuMetrics {
                usage_percent: cpu,
                cores: 4,
                load_avg_1m: load1,
                load_avg_5m: load5,
                load_avg_15m: 0.5,
            },
            memory: MemoryMetrics {
                total_mb: 16_000,
                used_mb: (mem_percent / 100.0 * 16_000.0) as u64,
                usage_percent: mem_percent,
            },
            network: NetworkMetrics {
                active_connections: 42,
            },
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn pattern() -> DetectedPattern {
        DetectedPattern {
            kind: PatternKind::CpuSpike,
            confidence: 0.9,
            evidence: vec!["CPU increased 25.0% per minute".to_string()],
            first_seen: Utc::now(),
            last_seen: Utc::now(),
            frequency: 2,
        }
    }

    fn pending_prediction(kind: PredictionKind, validate_at: DateTime<Utc>) -> SimplePrediction {
        SimplePrediction {
            id: format!("pred_test_{}", validate_at.timestamp()),
            kind,
            description: "test".to_string(),
            confidence: 0.8,
            time_horizon: TimeHorizon::FiveMinutes,
            created_at: validate_at - chrono::Duration::minutes(5),
            validate_at,
            was_correct: None,
            actual_result: None,
        }
    }

    async fn engine_with_mock_response(body: &str) -> (PredictionEngine, mockito::ServerGuard) {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/completion")
            .with_status(200)
            .with_body(format!(r#"{{"content": {}}}"#, serde_json::json!(body)))
            .create_async()
            .await;

        let mut router = LlmRouter::new();
        router.add_provider(LlmProvider {
            name: "fast_local".to_string(),
            protocol: ProviderProtocol::LocalCompletion,
            model: "test-model".to_string(),
            endpoint: format!("{}/completion", server.url()),
            api_key: None,
            task_affinities: vec!["all".to_string()],
            max_tokens: 500,
            temperature: 0.3,
            timeout: Duration::from_secs(5),
        });
        router.add_rule(RoutingRule::new(
            1,
            "task_type == prediction",
            "fast_local",
            "",
        ));

        (PredictionEngine::new(Arc::new(router)), server)
    }

    #[test]
    fn test_parse_clean_json() {
        let raw = parse_prediction(
            r#"{"type": "cpu_overload", "description": "CPU will exceed 95%",
                "confidence": 0.8, "time_horizon": "30_minutes"}"#,
        )
        .unwrap();

        assert_eq!(raw.kind, Some(PredictionKind::CpuOverload));
        assert_eq!(raw.time_horizon, TimeHorizon::ThirtyMinutes);
        assert!((raw.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_json_embedded_in_prose() {
        let raw = parse_prediction(
            r#"Here is my prediction:
{"type": "memory_exhaustion", "description": "Memory will exceed 90%", "confidence": 0.9}
Hope that helps!"#,
        )
        .unwrap();

        assert_eq!(raw.kind, Some(PredictionKind::MemoryExhaustion));
    }

    #[test]
    fn test_parse_garbage_is_an_error() {
        assert!(matches!(
            parse_prediction("I cannot make a prediction right now."),
            Err(PredictionError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_kind_parses_to_unknown() {
        let raw = parse_prediction(
            r#"{"type": "disk_full", "description": "Disk will fill up", "confidence": 0.8}"#,
        )
        .unwrap();
        assert_eq!(raw.kind, Some(PredictionKind::Unknown));
    }

    #[test]
    fn test_unrecognized_horizon_defaults() {
        let raw = parse_prediction(
            r#"{"type": "cpu_overload", "description": "soon", "time_horizon": "2_days"}"#,
        )
        .unwrap();
        assert_eq!(raw.time_horizon, TimeHorizon::Unspecified);
        assert_eq!(raw.time_horizon.offset(), chrono::Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_make_prediction_stamps_horizon_deadline() {
        let (engine, _server) = engine_with_mock_response(
            r#"{"type": "memory_exhaustion", "description": "Memory will exceed 90% in 30 minutes",
                "confidence": 0.85, "time_horizon": "30_minutes"}"#,
        )
        .await;

        let prediction = engine
            .make_prediction(&telemetry(50.0, 70.0, 1.0, 1.0), &[pattern()], None)
            .await
            .unwrap();

        assert_eq!(prediction.kind, PredictionKind::MemoryExhaustion);
        assert_eq!(
            prediction.validate_at - prediction.created_at,
            chrono::Duration::minutes(30)
        );
        assert!(prediction.id.starts_with("pred_"));
        assert_eq!(engine.pending_count().await, 1);
        assert_eq!(engine.recent_predictions(10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_coerced() {
        let (engine, _server) = engine_with_mock_response(
            r#"{"type": "cpu_overload", "description": "overload imminent", "confidence": 3.5}"#,
        )
        .await;

        let prediction = engine
            .make_prediction(&telemetry(50.0, 70.0, 1.0, 1.0), &[pattern()], None)
            .await
            .unwrap();

        assert!((prediction.confidence - 0.7).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_missing_description_is_an_error() {
        let (engine, _server) =
            engine_with_mock_response(r#"{"type": "cpu_overload", "confidence": 0.8}"#).await;

        let err = engine
            .make_prediction(&telemetry(50.0, 70.0, 1.0, 1.0), &[pattern()], None)
            .await
            .unwrap_err();

        assert!(matches!(err, PredictionError::MissingFields));
    }

    #[tokio::test]
    async fn test_validation_memory_exhaustion_correct_at_95_percent() {
        let router = Arc::new(LlmRouter::new());
        let engine = PredictionEngine::new(router);

        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let due = pending_prediction(PredictionKind::MemoryExhaustion, now);
        engine.push_history(due.clone()).await;
        engine.pending.write().await.push(due);

        let validated = engine
            .validate_pending(
                &telemetry(50.0, 95.0, 1.0, 1.0),
                now + chrono::Duration::seconds(1),
            )
            .await;

        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].was_correct, Some(true));
        assert_eq!(engine.pending_count().await, 0);

        let history = engine.recent_predictions(10).await;
        assert_eq!(history[0].was_correct, Some(true));
    }

    #[tokio::test]
    async fn test_validation_rules_per_kind() {
        let cases = [
            // (kind, telemetry, expected)
            (
                PredictionKind::CpuOverload,
                telemetry(96.0, 50.0, 1.0, 1.0),
                true,
            ),
            // load1 = 7.0 > 1.5 * 4 cores
            (
                PredictionKind::CpuOverload,
                telemetry(50.0, 50.0, 7.0, 1.0),
                true,
            ),
            (
                PredictionKind::CpuOverload,
                telemetry(50.0, 50.0, 1.0, 1.0),
                false,
            ),
            // load5 = 5.0 > 4 cores
            (
                PredictionKind::PerformanceDegradation,
                telemetry(50.0, 50.0, 1.0, 5.0),
                true,
            ),
            (
                PredictionKind::NormalOperation,
                telemetry(50.0, 50.0, 1.0, 1.0),
                true,
            ),
            (
                PredictionKind::NormalOperation,
                telemetry(85.0, 50.0, 1.0, 1.0),
                false,
            ),
            // fails closed
            (
                PredictionKind::Unknown,
                telemetry(10.0, 10.0, 0.1, 0.1),
                false,
            ),
            (
                PredictionKind::CrashLikely,
                telemetry(99.0, 99.0, 9.0, 9.0),
                false,
            ),
        ];

        for (kind, snapshot, expected) in cases {
            assert_eq!(
                check_prediction(kind, &snapshot),
                expected,
                "kind {:?} with cpu {:.0} mem {:.0}",
                kind,
                snapshot.cpu.usage_percent,
                snapshot.memory.usage_percent
            );
        }
    }

    #[tokio::test]
    async fn test_undue_predictions_stay_pending() {
        let engine = PredictionEngine::new(Arc::new(LlmRouter::new()));

        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let not_due = pending_prediction(PredictionKind::CpuOverload, now + chrono::Duration::minutes(5));
        engine.push_history(not_due.clone()).await;
        engine.pending.write().await.push(not_due);

        let validated = engine.validate_pending(&telemetry(96.0, 50.0, 1.0, 1.0), now).await;

        assert!(validated.is_empty());
        assert_eq!(engine.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_incorrect_prediction_records_actual_state() {
        let engine = PredictionEngine::new(Arc::new(LlmRouter::new()));

        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let due = pending_prediction(PredictionKind::MemoryExhaustion, now);
        engine.push_history(due.clone()).await;
        engine.pending.write().await.push(due);

        let validated = engine
            .validate_pending(
                &telemetry(50.0, 40.0, 1.0, 1.0),
                now + chrono::Duration::seconds(1),
            )
            .await;

        assert_eq!(validated[0].was_correct, Some(false));
        assert!(validated[0]
            .actual_result
            .as_deref()
            .unwrap()
            .contains("not exhausted"));
    }

    #[tokio::test]
    async fn test_accuracy_aggregation() {
        let engine = PredictionEngine::new(Arc::new(LlmRouter::new()));
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        for (i, kind) in [
            PredictionKind::MemoryExhaustion,
            PredictionKind::CpuOverload,
            PredictionKind::CpuOverload,
        ]
        .iter()
        .enumerate()
        {
            let mut p = pending_prediction(*kind, now + chrono::Duration::seconds(i as i64));
            p.id = format!("pred_{}", i);
            engine.push_history(p.clone()).await;
            engine.pending.write().await.push(p);
        }

        // Memory at 95% -> memory_exhaustion correct, cpu_overload incorrect
        engine
            .validate_pending(
                &telemetry(50.0, 95.0, 1.0, 1.0),
                now + chrono::Duration::minutes(1),
            )
            .await;

        let accuracy = engine.accuracy().await;
        assert_eq!(accuracy.total_predictions, 3);
        assert_eq!(accuracy.validated_count, 3);
        assert_eq!(accuracy.correct_count, 1);
        assert!((accuracy.accuracy_percent - 33.333).abs() < 0.01);
        assert_eq!(accuracy.by_kind["memory_exhaustion"].correct, 1);
        assert_eq!(accuracy.by_kind["cpu_overload"].total, 2);
        assert_eq!(accuracy.by_kind["cpu_overload"].correct, 0);
    }

    #[tokio::test]
    async fn test_history_capped_fifo() {
        let engine = PredictionEngine::new(Arc::new(LlmRouter::new()));
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        for i in 0..110 {
            let mut p = pending_prediction(PredictionKind::NormalOperation, now);
            p.id = format!("pred_{}", i);
            engine.push_history(p).await;
        }

        let history = engine.recent_predictions(200).await;
        assert_eq!(history.len(), 100);
        assert_eq!(history[0].id, "pred_10");
        assert_eq!(history[99].id, "pred_109");
    }

    #[test]
    fn test_prompt_embeds_patterns_and_rates() {
        let snapshot = telemetry(75.0, 60.0, 2.0, 1.5);
        let rate = Derivative {
            cpu_per_min: 25.0,
            memory_mb_per_min: 12.5,
            connections_per_min: 0.0,
            timestamp: snapshot.timestamp,
        };

        let prompt = build_prediction_prompt(&snapshot, &[pattern()], Some(&rate));

        assert!(prompt.contains("CPU: 75.0%"));
        assert!(prompt.contains("cpu_spike"));
        assert!(prompt.contains("CPU change: 25.0% per minute"));
        assert!(prompt.contains("Respond with ONLY valid JSON"));
    }
}
