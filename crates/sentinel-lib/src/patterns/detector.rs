//! Pattern detection rules
//!
//! Transforms raw snapshot/derivative history into named, confidence-scored
//! conditions. Detection runs on every new snapshot; patterns deduplicate
//! per kind and age out lazily when read.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Derivative, SnapshotRing};
use crate::models::TelemetrySnapshot;

/// Default snapshot ring capacity
const DEFAULT_RING_CAPACITY: usize = 100;

/// Default derivative history length
const DEFAULT_DERIVATIVE_HISTORY: usize = 100;

/// Kinds of detected patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    CpuSpike,
    MemoryLeak,
    PeriodicCpuSpike,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::CpuSpike => write!(f, "cpu_spike"),
            PatternKind::MemoryLeak => write!(f, "memory_leak"),
            PatternKind::PeriodicCpuSpike => write!(f, "periodic_cpu_spike"),
        }
    }
}

/// An ongoing detected condition
#[derive(Debug, Clone, Serialize)]
pub struct DetectedPattern {
    pub kind: PatternKind,
    /// Confidence in [0, 1] backed by the evidence below
    pub confidence: f64,
    /// Human-readable data points supporting the pattern
    pub evidence: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// How many times this pattern has been re-detected
    pub frequency: u32,
}

/// Detection thresholds and windows.
///
/// All values are heuristic defaults rather than tuned constants; deployments
/// with faster sampling should lower `rate_floor` accordingly.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Snapshot ring capacity
    pub ring_capacity: usize,
    /// Minimum elapsed time between snapshots used for rate division
    pub rate_floor: Duration,
    /// CPU rate (percentage points/minute) above which a spike fires
    pub cpu_spike_rate: f64,
    /// Number of recent derivatives examined for memory growth
    pub leak_window: usize,
    /// Growth samples within the window required to report a leak
    pub leak_min_growth: usize,
    /// Snapshots required before periodic detection runs
    pub periodic_min_snapshots: usize,
    /// CPU usage below which a snapshot counts as pre-onset
    pub onset_low: f64,
    /// CPU usage above which a snapshot counts as a spike onset
    pub onset_high: f64,
    /// Allowed fractional deviation of each interval from the mean
    pub interval_tolerance: f64,
    /// Freshness window; patterns unseen for longer are evicted on read
    pub pattern_ttl: Duration,
    /// Derivative history length
    pub derivative_history: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ring_capacity: DEFAULT_RING_CAPACITY,
            rate_floor: Duration::from_secs(60),
            cpu_spike_rate: 20.0,
            leak_window: 5,
            leak_min_growth: 4,
            periodic_min_snapshots: 20,
            onset_low: 70.0,
            onset_high: 80.0,
            interval_tolerance: 0.3,
            pattern_ttl: Duration::from_secs(10 * 60),
            derivative_history: DEFAULT_DERIVATIVE_HISTORY,
        }
    }
}

/// Detects temporal patterns over the snapshot ring
pub struct PatternDetector {
    config: DetectorConfig,
    ring: SnapshotRing,
    derivatives: VecDeque<Derivative>,
    patterns: Vec<DetectedPattern>,
}

impl PatternDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let ring = SnapshotRing::new(config.ring_capacity);
        Self {
            config,
            ring,
            derivatives: VecDeque::new(),
            patterns: Vec::new(),
        }
    }

    /// Add a snapshot, compute the derivative once two exist, and run all
    /// detection rules
    pub fn push_snapshot(&mut self, snapshot: TelemetrySnapshot) {
        self.ring.push(snapshot);

        if let (Some(previous), Some(current)) = (self.ring.previous(), self.ring.latest()) {
            let rate = Derivative::between(previous, current, self.config.rate_floor);
            self.derivatives.push_back(rate);
            while self.derivatives.len() > self.config.derivative_history {
                self.derivatives.pop_front();
            }
        }

        self.detect_cpu_spike();
        self.detect_memory_leak();
        self.detect_periodic_spikes();
    }

    /// Currently active patterns.
    ///
    /// Evicts patterns whose `last_seen` fell outside the freshness window;
    /// pruning is a side effect of this read, not a scheduled job.
    pub fn active_patterns(&mut self, now: DateTime<Utc>) -> Vec<DetectedPattern> {
        let ttl = chrono::Duration::from_std(self.config.pattern_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(600));
        let cutoff = now - ttl;
        self.patterns.retain(|p| p.last_seen > cutoff);
        self.patterns.clone()
    }

    /// Recent derivatives, oldest first
    pub fn derivatives(&self) -> &VecDeque<Derivative> {
        &self.derivatives
    }

    /// Most recent derivative
    pub fn latest_derivative(&self) -> Option<&Derivative> {
        self.derivatives.back()
    }

    /// Number of buffered snapshots
    pub fn snapshot_count(&self) -> usize {
        self.ring.len()
    }

    fn detect_cpu_spike(&mut self) {
        let Some(latest) = self.derivatives.back() else {
            return;
        };

        if latest.cpu_per_min > self.config.cpu_spike_rate {
            let seen_at = latest.timestamp;
            let evidence = vec![
                format!("CPU increased {:.1}% per minute", latest.cpu_per_min),
                format!(
                    "Current CPU: {:.1}%",
                    self.ring
                        .latest()
                        .map(|s| s.cpu.usage_percent)
                        .unwrap_or_default()
                ),
            ];
            self.record(PatternKind::CpuSpike, 0.9, evidence, seen_at);
        }
    }

    fn detect_memory_leak(&mut self) {
        let window = self.config.leak_window;
        if self.derivatives.len() < window {
            return;
        }

        let recent: Vec<&Derivative> = self.derivatives.iter().rev().take(window).collect();
        let growth_count = recent
            .iter()
            .filter(|d| d.memory_mb_per_min > 0.0)
            .count();
        let total_growth: f64 = recent
            .iter()
            .filter(|d| d.memory_mb_per_min > 0.0)
            .map(|d| d.memory_mb_per_min)
            .sum();

        if growth_count >= self.config.leak_min_growth {
            let confidence = growth_count as f64 / window as f64;
            let seen_at = recent[0].timestamp;
            let evidence = vec![
                format!("{}/{} samples show memory growth", growth_count, window),
                format!("Average growth: {:.1} MB/min", total_growth / window as f64),
                format!(
                    "Current memory: {} MB",
                    self.ring
                        .latest()
                        .map(|s| s.memory.used_mb)
                        .unwrap_or_default()
                ),
            ];
            self.record(PatternKind::MemoryLeak, confidence, evidence, seen_at);
        }
    }

    fn detect_periodic_spikes(&mut self) {
        if self.ring.len() < self.config.periodic_min_snapshots {
            return;
        }

        let snapshots = self.ring.snapshots();
        let mut onsets: Vec<DateTime<Utc>> = Vec::new();
        for pair in snapshots.windows(2) {
            if pair[0].cpu.usage_percent < self.config.onset_low
                && pair[1].cpu.usage_percent > self.config.onset_high
            {
                onsets.push(pair[1].timestamp);
            }
        }

        if onsets.len() < 3 {
            return;
        }

        let intervals: Vec<f64> = onsets
            .windows(2)
            .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
            .collect();
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;

        let regular = intervals
            .iter()
            .all(|i| (i - mean).abs() <= mean * self.config.interval_tolerance);
        if !regular {
            return;
        }

        let Some(&seen_at) = onsets.last() else {
            return;
        };
        let evidence = vec![
            format!("Detected {} spikes", onsets.len()),
            format!("Average interval: {:.0}s", mean),
            format!("Pattern repeats every ~{:.0} minutes", mean / 60.0),
        ];
        self.record(PatternKind::PeriodicCpuSpike, 0.8, evidence, seen_at);
    }

    /// Record a detection, updating the existing entry for the kind in place
    fn record(
        &mut self,
        kind: PatternKind,
        confidence: f64,
        evidence: Vec<String>,
        seen_at: DateTime<Utc>,
    ) {
        if let Some(existing) = self.patterns.iter_mut().find(|p| p.kind == kind) {
            existing.last_seen = seen_at;
            existing.frequency += 1;
            existing.evidence = evidence;
            existing.confidence = confidence;
            return;
        }

        self.patterns.push(DetectedPattern {
            kind,
            confidence,
            evidence,
            first_seen: seen_at,
            last_seen: seen_at,
            frequency: 1,
        });
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CpuMetrics, MemoryMetrics, NetworkMetrics};
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn snapshot(minute: i64, cpu: f64, used_mb: u64) -> TelemetrySnapshot {
        TelemetrySnapshot {
            cpu: CpuMetrics {
                usage_percent: cpu,
                cores: 4,
                load_avg_1m: 0.5,
                load_avg_5m: 0.4,
                load_avg_15m: 0.3,
            },
            memory: MemoryMetrics {
                total_mb: 16_000,
                used_mb,
                usage_percent: used_mb as f64 / 16_000.0 * 100.0,
            },
            network: NetworkMetrics {
                active_connections: 50,
            },
            timestamp: base_time() + chrono::Duration::minutes(minute),
        }
    }

    fn find(patterns: &[DetectedPattern], kind: PatternKind) -> Option<&DetectedPattern> {
        patterns.iter().find(|p| p.kind == kind)
    }

    #[test]
    fn test_no_detection_with_single_snapshot() {
        let mut detector = PatternDetector::default();
        detector.push_snapshot(snapshot(0, 95.0, 4_000));

        assert!(detector.latest_derivative().is_none());
        assert!(detector.active_patterns(base_time()).is_empty());
    }

    #[test]
    fn test_cpu_rate_at_threshold_does_not_fire() {
        let mut detector = PatternDetector::default();
        // Exactly 20.0%/minute: strict comparison must not trigger
        detector.push_snapshot(snapshot(0, 50.0, 4_000));
        detector.push_snapshot(snapshot(1, 70.0, 4_000));

        let patterns = detector.active_patterns(base_time() + chrono::Duration::minutes(1));
        assert!(find(&patterns, PatternKind::CpuSpike).is_none());
    }

    #[test]
    fn test_cpu_rate_above_threshold_fires_with_fixed_confidence() {
        let mut detector = PatternDetector::default();
        detector.push_snapshot(snapshot(0, 50.0, 4_000));
        detector.push_snapshot(snapshot(1, 70.01, 4_000));

        let patterns = detector.active_patterns(base_time() + chrono::Duration::minutes(1));
        let spike = find(&patterns, PatternKind::CpuSpike).expect("spike should fire");
        assert!((spike.confidence - 0.9).abs() < f64::EPSILON);
        assert!(spike.evidence[0].contains("per minute"));
    }

    #[test]
    fn test_memory_leak_four_of_five_growing() {
        let mut detector = PatternDetector::default();
        // Deltas between consecutive snapshots: +10, +10, +10, -5, +10
        let usages = [4_000u64, 4_010, 4_020, 4_030, 4_025, 4_035];
        for (i, used) in usages.iter().enumerate() {
            detector.push_snapshot(snapshot(i as i64, 30.0, *used));
        }

        let patterns = detector.active_patterns(base_time() + chrono::Duration::minutes(5));
        let leak = find(&patterns, PatternKind::MemoryLeak).expect("leak should fire");
        assert!((leak.confidence - 0.8).abs() < 0.001);
        assert!(leak.evidence[0].contains("4/5"));
    }

    #[test]
    fn test_memory_leak_three_of_five_does_not_fire() {
        let mut detector = PatternDetector::default();
        // Deltas: +10, +10, -5, -5, +10
        let usages = [4_000u64, 4_010, 4_020, 4_015, 4_010, 4_020];
        for (i, used) in usages.iter().enumerate() {
            detector.push_snapshot(snapshot(i as i64, 30.0, *used));
        }

        let patterns = detector.active_patterns(base_time() + chrono::Duration::minutes(5));
        assert!(find(&patterns, PatternKind::MemoryLeak).is_none());
    }

    #[test]
    fn test_repeated_detection_deduplicates() {
        let mut detector = PatternDetector::default();
        detector.push_snapshot(snapshot(0, 20.0, 4_000));
        detector.push_snapshot(snapshot(1, 60.0, 4_000));
        detector.push_snapshot(snapshot(2, 95.0, 4_000));

        let patterns = detector.active_patterns(base_time() + chrono::Duration::minutes(2));
        let spikes: Vec<_> = patterns
            .iter()
            .filter(|p| p.kind == PatternKind::CpuSpike)
            .collect();
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].frequency, 2);
        assert_eq!(spikes[0].first_seen, base_time() + chrono::Duration::minutes(1));
        assert_eq!(spikes[0].last_seen, base_time() + chrono::Duration::minutes(2));
    }

    #[test]
    fn test_stale_pattern_evicted_on_read() {
        let mut detector = PatternDetector::default();
        detector.push_snapshot(snapshot(0, 50.0, 4_000));
        detector.push_snapshot(snapshot(1, 80.0, 4_000));

        let fresh = detector.active_patterns(base_time() + chrono::Duration::minutes(5));
        assert!(find(&fresh, PatternKind::CpuSpike).is_some());

        // 11 minutes after last_seen: outside the 10-minute freshness window
        let later = detector.active_patterns(base_time() + chrono::Duration::minutes(12));
        assert!(find(&later, PatternKind::CpuSpike).is_none());
    }

    #[test]
    fn test_periodic_spikes_with_regular_intervals() {
        let mut detector = PatternDetector::default();
        for i in 0..21 {
            let cpu = if i == 5 || i == 11 || i == 17 { 85.0 } else { 50.0 };
            detector.push_snapshot(snapshot(i, cpu, 4_000));
        }

        let patterns = detector.active_patterns(base_time() + chrono::Duration::minutes(21));
        let periodic =
            find(&patterns, PatternKind::PeriodicCpuSpike).expect("periodic should fire");
        assert!((periodic.confidence - 0.8).abs() < f64::EPSILON);
        assert!(periodic.evidence[0].contains("3 spikes"));
    }

    #[test]
    fn test_periodic_skipped_below_minimum_snapshots() {
        let mut detector = PatternDetector::default();
        for i in 0..19 {
            let cpu = if i % 6 == 5 { 85.0 } else { 50.0 };
            detector.push_snapshot(snapshot(i, cpu, 4_000));
        }

        let patterns = detector.active_patterns(base_time() + chrono::Duration::minutes(19));
        assert!(find(&patterns, PatternKind::PeriodicCpuSpike).is_none());
    }

    #[test]
    fn test_irregular_intervals_do_not_fire_periodic() {
        let mut detector = PatternDetector::default();
        for i in 0..30 {
            let cpu = if i == 3 || i == 9 || i == 27 { 85.0 } else { 50.0 };
            detector.push_snapshot(snapshot(i, cpu, 4_000));
        }

        let patterns = detector.active_patterns(base_time() + chrono::Duration::minutes(30));
        assert!(find(&patterns, PatternKind::PeriodicCpuSpike).is_none());
    }

    #[test]
    fn test_spike_scenario_end_to_end() {
        let mut detector = PatternDetector::default();
        for (i, cpu) in [60.0, 65.0, 90.0, 92.0].iter().enumerate() {
            detector.push_snapshot(snapshot(i as i64, *cpu, 4_000));
        }

        let patterns = detector.active_patterns(base_time() + chrono::Duration::minutes(3));
        let spike = find(&patterns, PatternKind::CpuSpike).expect("spike should fire");
        assert!((spike.confidence - 0.9).abs() < f64::EPSILON);
        // 65 -> 90 over one minute
        assert!(spike.evidence.iter().any(|e| e.contains("25.0")));
    }
}
