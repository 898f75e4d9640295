//! Metrics data types and percentage clamping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three headline percentages of one host reading. Stored in history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
    pub timestamp: DateTime<Utc>,
}

/// Static enrichment returned next to the current sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostDetails {
    pub cpu: CpuDetails,
    pub memory: MemoryUsage,
    pub disk: DiskUsage,
    pub boot_time: u64, // Unix timestamp
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuDetails {
    pub count: usize,
    pub frequency_mhz: Option<u64>,
    pub per_core: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub mount_point: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

/// What a sampler reports. A facet that could not be read is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReading {
    pub cpu_percent: Option<f32>,
    pub memory_percent: Option<f32>,
    pub disk_percent: Option<f32>,
    pub details: HostDetails,
}

/// Current sample plus enrichment, as served to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(flatten)]
    pub sample: MetricsSample,
    pub details: HostDetails,
}

impl MetricsSnapshot {
    /// Clamp every percentage of `reading` into `[0, 100]`.
    pub fn from_reading(reading: RawReading, timestamp: DateTime<Utc>) -> Self {
        let mut details = reading.details;
        for core in details.cpu.per_core.iter_mut() {
            *core = clamp_percent(Some(*core));
        }

        Self {
            sample: MetricsSample {
                cpu_percent: clamp_percent(reading.cpu_percent),
                memory_percent: clamp_percent(reading.memory_percent),
                disk_percent: clamp_percent(reading.disk_percent),
                timestamp,
            },
            details,
        }
    }
}

/// Column view of the history: one vector per facet, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySeries {
    pub cpu: Vec<f32>,
    pub memory: Vec<f32>,
    pub disk: Vec<f32>,
    pub timestamp: Vec<DateTime<Utc>>,
}

impl HistorySeries {
    pub fn from_samples(samples: &[MetricsSample]) -> Self {
        Self {
            cpu: samples.iter().map(|s| s.cpu_percent).collect(),
            memory: samples.iter().map(|s| s.memory_percent).collect(),
            disk: samples.iter().map(|s| s.disk_percent).collect(),
            timestamp: samples.iter().map(|s| s.timestamp).collect(),
        }
    }
}

/// Missing, NaN or infinite readings become 0; the rest is clamped to [0, 100].
pub fn clamp_percent(value: Option<f32>) -> f32 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// `used / total` as a percentage, `None` when total is zero.
pub fn percent_of(used: u64, total: u64) -> Option<f32> {
    if total > 0 {
        Some((used as f64 / total as f64 * 100.0) as f32)
    } else {
        None
    }
}
