//! Host metrics sampling.
//!
//! A sampler takes one synchronous reading of the host; the snapshot cache
//! in front of it serves recent readings and keeps a bounded history.

mod collector;
mod history;
mod metrics;
mod snapshot;

pub use collector::{pick_disk, MetricsSampler, SysinfoSampler};
pub use history::{RingBuffer, DEFAULT_HISTORY_SIZE};
pub use metrics::{
    clamp_percent, percent_of, CpuDetails, DiskUsage, HistorySeries, HostDetails, MemoryUsage,
    MetricsSample, MetricsSnapshot, RawReading,
};
pub use snapshot::{MetricsCache, MetricsCacheSettings};
