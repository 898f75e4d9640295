//! Short-lived cache in front of the host sampler, plus bounded history.
//!
//! The latest snapshot and the history buffer sit behind one lock so that
//! `clear_all` resets both at once. The sampler has its own lock: callers
//! that miss the cache queue on it, and whoever gets it second re-checks
//! the cache instead of sampling again.

use chrono::Utc;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

use super::collector::MetricsSampler;
use super::history::RingBuffer;
use super::metrics::{HistorySeries, MetricsSample, MetricsSnapshot};
use crate::core::config::Config;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsCacheSettings {
    pub ttl: Duration,
    pub history_limit: usize,
}

impl Default for MetricsCacheSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for MetricsCacheSettings {
    fn from(config: &Config) -> Self {
        Self {
            ttl: config.metrics_ttl(),
            history_limit: config.history_limit,
        }
    }
}

struct MetricsState {
    latest: Option<(MetricsSnapshot, Instant)>,
    history: RingBuffer<MetricsSample>,
}

pub struct MetricsCache {
    sampler: Mutex<Box<dyn MetricsSampler>>,
    state: Mutex<MetricsState>,
    ttl: Duration,
}

impl std::fmt::Debug for MetricsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MetricsCache")
            .field("ttl", &self.ttl)
            .field("history_len", &state.history.len())
            .field("history_capacity", &state.history.capacity())
            .finish()
    }
}

impl MetricsCache {
    pub fn new(sampler: Box<dyn MetricsSampler>, settings: MetricsCacheSettings) -> Self {
        Self {
            sampler: Mutex::new(sampler),
            state: Mutex::new(MetricsState {
                latest: None,
                history: RingBuffer::with_capacity(settings.history_limit),
            }),
            ttl: settings.ttl,
        }
    }

    /// Current metrics: the cached snapshot if younger than the TTL,
    /// otherwise a fresh, clamped reading that is also appended to history.
    pub fn get_metrics(&self) -> Result<MetricsSnapshot> {
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot);
        }

        let mut sampler = self.sampler.lock();
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot);
        }

        let reading = sampler.sample().map_err(|e| {
            log::error!("Error getting system metrics: {}", e);
            e
        })?;
        let snapshot = MetricsSnapshot::from_reading(reading, Utc::now());

        let mut state = self.state.lock();
        if let Some(evicted) = state.history.push(snapshot.sample) {
            log::trace!("Metrics history full, evicted sample from {}", evicted.timestamp);
        }
        state.latest = Some((snapshot.clone(), Instant::now()));
        log::debug!(
            "Sampled host metrics: cpu={:.1}% mem={:.1}% disk={:.1}%",
            snapshot.sample.cpu_percent,
            snapshot.sample.memory_percent,
            snapshot.sample.disk_percent
        );

        Ok(snapshot)
    }

    /// Copy of the history, oldest first.
    pub fn get_history(&self) -> Vec<MetricsSample> {
        self.state.lock().history.to_vec()
    }

    pub fn history_series(&self) -> HistorySeries {
        HistorySeries::from_samples(&self.get_history())
    }

    pub fn history_capacity(&self) -> usize {
        self.state.lock().history.capacity()
    }

    /// Drop the cached snapshot and empty the history in one step.
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        state.history.clear();
        state.latest = None;
        log::info!("Metrics cache and history cleared");
    }

    fn fresh_snapshot(&self) -> Option<MetricsSnapshot> {
        let state = self.state.lock();
        state
            .latest
            .as_ref()
            .filter(|(_, taken_at)| taken_at.elapsed() < self.ttl)
            .map(|(snapshot, _)| snapshot.clone())
    }
}
