//! Temporal pattern detection over telemetry history
//!
//! This module provides:
//! - A fixed-capacity ring of recent snapshots
//! - Per-minute rate-of-change computation between adjacent snapshots
//! - Detection of CPU spikes, memory leaks and periodic spikes with
//!   evidence-backed confidence scores

mod detector;
mod rate;
mod ring;

pub use detector::{DetectedPattern, DetectorConfig, PatternDetector, PatternKind};
pub use rate::Derivative;
pub use ring::SnapshotRing;
