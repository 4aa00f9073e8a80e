//! Rate-of-change computation between adjacent snapshots

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::TelemetrySnapshot;

/// Per-minute rate of change between two consecutive snapshots.
///
/// The elapsed time is floored to a configurable minimum before dividing,
/// so snapshots arriving faster than the floor cannot explode the rates.
#[derive(Debug, Clone, Serialize)]
pub struct Derivative {
    /// CPU usage change in percentage points per minute
    pub cpu_per_min: f64,
    /// Memory usage change in MB per minute
    pub memory_mb_per_min: f64,
    /// Active connection count change per minute
    pub connections_per_min: f64,
    /// Timestamp of the later snapshot
    pub timestamp: DateTime<Utc>,
}

impl Derivative {
    /// Compute the rate of change from `previous` to `current`.
    ///
    /// Pure function of its two inputs; `elapsed_floor` is the minimum
    /// elapsed time used for the division.
    pub fn between(
        previous: &TelemetrySnapshot,
        current: &TelemetrySnapshot,
        elapsed_floor: Duration,
    ) -> Self {
        let elapsed_secs = (current.timestamp - previous.timestamp)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;
        let floor_secs = elapsed_floor.as_secs_f64();
        let elapsed_minutes = elapsed_secs.max(floor_secs) / 60.0;

        let memory_delta = current.memory.used_mb as i64 - previous.memory.used_mb as i64;
        let connection_delta =
            current.network.active_connections as i64 - previous.network.active_connections as i64;

        Self {
            cpu_per_min: (current.cpu.usage_percent - previous.cpu.usage_percent)
                / elapsed_minutes,
            memory_mb_per_min: memory_delta as f64 / elapsed_minutes,
            connections_per_min: connection_delta as f64 / elapsed_minutes,
            timestamp: current.timestamp,
        }
    }
}
