//! Core data models for the sentinel agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CPU metrics for one snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub usage_percent: f64,
    pub cores: u32,
    pub load_avg_1m: f64,
    pub load_avg_5m: f64,
    pub load_avg_15m: f64,
}

/// Memory metrics for one snapshot (megabytes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub total_mb: u64,
    pub used_mb: u64,
    pub usage_percent: f64,
}

/// Network metrics for one snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub active_connections: u32,
}

/// One timestamped read of host resource metrics.
///
/// Produced by a [`crate::collector::TelemetrySource`] once per tick and
/// never mutated after capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub network: NetworkMetrics,
    pub timestamp: DateTime<Utc>,
}

impl TelemetrySnapshot {
    /// Memory usage as a percentage of total, recomputed from the raw
    /// counters when the collector left `usage_percent` unset.
    pub fn memory_percent(&self) -> f64 {
        if self.memory.usage_percent > 0.0 {
            return self.memory.usage_percent;
        }
        if self.memory.total_mb == 0 {
            return 0.0;
        }
        self.memory.used_mb as f64 / self.memory.total_mb as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_percent_prefers_collector_value() {
        let snapshot = TelemetrySnapshot {
            cpu: CpuMetrics {
                usage_percent: 10.0,
                cores: 4,
                load_avg_1m: 0.5,
                load_avg_5m: 0.4,
                load_avg_15m: 0.3,
            },
            memory: MemoryMetrics {
                total_mb: 16_000,
                used_mb: 4_000,
                usage_percent: 25.0,
            },
            network: NetworkMetrics {
                active_connections: 12,
            },
            timestamp: Utc::now(),
        };

        assert!((snapshot.memory_percent() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_memory_percent_computed_when_unset() {
        let snapshot = TelemetrySnapshot {
            cpu: CpuMetrics {
                usage_percent: 10.0,
                cores: 4,
                load_avg_1m: 0.5,
                load_avg_5m: 0.4,
                load_avg_15m: 0.3,
            },
            memory: MemoryMetrics {
                total_mb: 8_000,
                used_mb: 2_000,
                usage_percent: 0.0,
            },
            network: NetworkMetrics {
                active_connections: 0,
            },
            timestamp: Utc::now(),
        };

        assert!((snapshot.memory_percent() - 25.0).abs() < 0.001);
    }
}
