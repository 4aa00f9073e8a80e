//! Host telemetry collection
//!
//! This module provides the telemetry source seam, a procfs-backed
//! implementation for Linux hosts, and the monitoring loop that drives
//! pattern detection and prediction dispatch.

mod procfs;
mod r#loop;

pub use procfs::ProcfsSource;
pub use r#loop::{MonitorConfig, MonitorLoop};

use crate::models::TelemetrySnapshot;
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for telemetry snapshot producers
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Capture one snapshot of current host metrics
    async fn sample(&self) -> Result<TelemetrySnapshot>;
}
