//! procfs-backed telemetry source
//!
//! Reads host metrics from the proc filesystem:
//! - /proc/stat for aggregate CPU time and core count
//! - /proc/meminfo for memory totals
//! - /proc/loadavg for load averages
//! - /proc/net/tcp and /proc/net/tcp6 for established connection counts

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs;

use super::{async_trait, TelemetrySource};
use crate::models::{CpuMetrics, MemoryMetrics, NetworkMetrics, TelemetrySnapshot};

/// TCP state code for ESTABLISHED in /proc/net/tcp
const TCP_ESTABLISHED: &str = "01";

/// Aggregate CPU jiffies from one /proc/stat read
#[derive(Debug, Clone, Copy)]
struct CpuTotals {
    idle: u64,
    total: u64,
}

/// Telemetry source reading the Linux proc filesystem
pub struct ProcfsSource {
    proc_root: PathBuf,
    /// Previous CPU totals; usage is the busy share of the delta
    prev_cpu: Mutex<Option<CpuTotals>>,
}

impl ProcfsSource {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Create a source with a custom proc root (for testing)
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            prev_cpu: Mutex::new(None),
        }
    }

    /// Parse the aggregate "cpu " line of /proc/stat
    /// Returns idle (idle + iowait) and total jiffies
    fn parse_cpu_totals(stat: &str) -> Option<CpuTotals> {
        let line = stat.lines().find(|l| l.starts_with("cpu "))?;
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .filter_map(|f| f.parse().ok())
            .collect();
        if fields.len() < 5 {
            return None;
        }

        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        let total: u64 = fields.iter().sum();
        Some(CpuTotals { idle, total })
    }

    /// Count per-core "cpuN" lines in /proc/stat
    fn count_cores(stat: &str) -> u32 {
        stat.lines()
            .filter(|l| {
                l.starts_with("cpu")
                    && l.as_bytes()
                        .get(3)
                        .map(|b| b.is_ascii_digit())
                        .unwrap_or(false)
            })
            .count() as u32
    }

    /// Parse MemTotal and MemAvailable (kB) from /proc/meminfo
    fn parse_meminfo(meminfo: &str) -> (u64, u64) {
        let mut total_kb = 0u64;
        let mut available_kb = 0u64;

        for line in meminfo.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                match parts[0] {
                    "MemTotal:" => total_kb = parts[1].parse().unwrap_or(0),
                    "MemAvailable:" => available_kb = parts[1].parse().unwrap_or(0),
                    _ => {}
                }
            }
        }

        (total_kb, available_kb)
    }

    /// Parse the three load averages from /proc/loadavg
    fn parse_loadavg(loadavg: &str) -> (f64, f64, f64) {
        let mut fields = loadavg.split_whitespace();
        let one = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0.0);
        let five = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0.0);
        let fifteen = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0.0);
        (one, five, fifteen)
    }

    /// Count ESTABLISHED sockets in a /proc/net/tcp-format table
    fn count_established(tcp: &str) -> u32 {
        tcp.lines()
            .skip(1)
            .filter(|line| {
                line.split_whitespace()
                    .nth(3)
                    .map(|state| state == TCP_ESTABLISHED)
                    .unwrap_or(false)
            })
            .count() as u32
    }

    /// CPU usage percent from the delta against the previous read.
    /// The first read reports the busy share since boot.
    fn cpu_usage_percent(&self, current: CpuTotals) -> f64 {
        let mut prev = self.prev_cpu.lock().expect("cpu totals poisoned");
        let usage = match *prev {
            Some(previous) if current.total > previous.total => {
                let total_delta = (current.total - previous.total) as f64;
                let idle_delta = current.idle.saturating_sub(previous.idle) as f64;
                (total_delta - idle_delta) / total_delta * 100.0
            }
            Some(_) => 0.0,
            None if current.total > 0 => {
                (current.total - current.idle) as f64 / current.total as f64 * 100.0
            }
            None => 0.0,
        };
        *prev = Some(current);
        usage.clamp(0.0, 100.0)
    }
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySource for ProcfsSource {
    async fn sample(&self) -> Result<TelemetrySnapshot> {
        let stat = fs::read_to_string(self.proc_root.join("stat"))
            .await
            .context("Failed to read /proc/stat")?;
        let totals = Self::parse_cpu_totals(&stat).context("No aggregate cpu line in stat")?;
        let cores = Self::count_cores(&stat).max(1);
        let usage_percent = self.cpu_usage_percent(totals);

        let meminfo = fs::read_to_string(self.proc_root.join("meminfo"))
            .await
            .context("Failed to read /proc/meminfo")?;
        let (total_kb, available_kb) = Self::parse_meminfo(&meminfo);
        let total_mb = total_kb / 1024;
        let used_mb = total_kb.saturating_sub(available_kb) / 1024;
        let memory_percent = if total_kb > 0 {
            total_kb.saturating_sub(available_kb) as f64 / total_kb as f64 * 100.0
        } else {
            0.0
        };

        let loadavg = fs::read_to_string(self.proc_root.join("loadavg"))
            .await
            .context("Failed to read /proc/loadavg")?;
        let (load_avg_1m, load_avg_5m, load_avg_15m) = Self::parse_loadavg(&loadavg);

        // IPv6 table may be absent; treat it as empty
        let tcp = fs::read_to_string(self.proc_root.join("net/tcp"))
            .await
            .unwrap_or_default();
        let tcp6 = fs::read_to_string(self.proc_root.join("net/tcp6"))
            .await
            .unwrap_or_default();
        let active_connections = Self::count_established(&tcp) + Self::count_established(&tcp6);

        Ok(TelemetrySnapshot {
            cpu: CpuMetrics {
                usage_percent,
                cores,
                load_avg_1m,
                load_avg_5m,
                load_avg_15m,
            },
            memory: MemoryMetrics {
                total_mb,
                used_mb,
                usage_percent: memory_percent,
            },
            network: NetworkMetrics { active_connections },
            timestamp: Utc::now(),
        })
    }
}
