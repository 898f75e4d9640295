//! Scan result cache with single-flight coordination.
//!
//! A request for a subject is answered from the cache when a fresh entry
//! exists, joins the scan already running for that subject when there is
//! one, and otherwise starts exactly one new scan. Scans run on their own
//! task, so a caller that gives up (or is dropped) never cancels the scan;
//! its result still lands in the cache for later readers.
//!
//! Cache entries and the in-flight table live under one lock, and a
//! finished scan publishes its entry, leaves the in-flight table and wakes
//! its waiters in a single critical section.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};

use super::invoker::ScanInvoker;
use super::report::{self, Finding, SeverityCounts};
use crate::core::config::Config;
use crate::core::subject::ScanKey;
use crate::error::{KdashError, Result};

/// A cached scan result. Never mutated; a refresh replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub key: ScanKey,
    pub produced_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub severity_counts: SeverityCounts,
    pub total_count: u32,
    pub findings: Vec<Finding>,
    pub raw_detail: Value,
}

impl ScanEntry {
    pub fn new(
        key: ScanKey,
        produced_at: DateTime<Utc>,
        ttl: Duration,
        report: report::ScanReport,
    ) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = produced_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            key,
            produced_at,
            expires_at,
            total_count: report.counts.total(),
            severity_counts: report.counts,
            findings: report.findings,
            raw_detail: report.raw,
        }
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

/// Floor for the waiters' re-check interval; zero would busy-loop.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timing knobs of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub ttl: Duration,
    /// Wall-clock budget handed to (and enforced around) each invocation
    pub scan_timeout: Duration,
    /// Upper bound a caller waits on somebody else's scan
    pub wait_timeout: Duration,
    /// Waiters re-check at least this often even without a wakeup
    pub poll_interval: Duration,
}

impl CoordinatorSettings {
    /// `poll_interval`, but never below `MIN_POLL_INTERVAL`.
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CoordinatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            ttl: config.scan_cache_ttl(),
            scan_timeout: config.scan_timeout(),
            wait_timeout: config.wait_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// Per-entry line of [`CacheInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryInfo {
    pub key: ScanKey,
    pub age_seconds: u64,
    pub expires_in_seconds: u64,
}

/// Cache introspection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub total_cached_entries: usize,
    pub ttl_seconds: u64,
    pub entries: Vec<CacheEntryInfo>,
}

/// `None` while the scan runs, then the shared outcome.
type Outcome = Option<Result<Arc<ScanEntry>>>;

#[derive(Default)]
struct ScanState {
    entries: HashMap<ScanKey, Arc<ScanEntry>>,
    in_flight: HashMap<ScanKey, watch::Receiver<Outcome>>,
}

impl ScanState {
    fn fresh_entry(&self, key: &ScanKey, now: DateTime<Utc>) -> Option<Arc<ScanEntry>> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh_at(now))
            .cloned()
    }
}

enum Plan {
    Hit(Arc<ScanEntry>),
    Lead(watch::Receiver<Outcome>),
    Join(watch::Receiver<Outcome>),
}

/// Owns the scan cache and the in-flight table. Cloning yields another
/// handle to the same cache.
#[derive(Clone)]
pub struct ScanCoordinator {
    invoker: Arc<dyn ScanInvoker>,
    settings: CoordinatorSettings,
    state: Arc<Mutex<ScanState>>,
}

impl std::fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ScanCoordinator")
            .field("settings", &self.settings)
            .field("cached_entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

impl ScanCoordinator {
    pub fn new(invoker: Arc<dyn ScanInvoker>, settings: CoordinatorSettings) -> Self {
        Self {
            invoker,
            settings,
            state: Arc::new(Mutex::new(ScanState::default())),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Return a fresh cached entry, join the running scan, or start one.
    ///
    /// With `force_refresh` the cache is bypassed, but a scan already in
    /// flight for the key is still joined rather than duplicated.
    pub async fn get_or_scan(&self, key: &ScanKey, force_refresh: bool) -> Result<Arc<ScanEntry>> {
        let plan = {
            let mut state = self.state.lock();
            let cached = if force_refresh {
                None
            } else {
                state.fresh_entry(key, Utc::now())
            };

            if let Some(entry) = cached {
                Plan::Hit(entry)
            } else if let Some(rx) = state.in_flight.get(key) {
                Plan::Join(rx.clone())
            } else {
                // Commit point: from here on this caller owns the scan
                let (tx, rx) = watch::channel(None);
                state.in_flight.insert(key.clone(), rx.clone());
                self.spawn_scan(key.clone(), tx);
                Plan::Lead(rx)
            }
        };

        match plan {
            Plan::Hit(entry) => {
                log::debug!("Scan cache hit for {}", key);
                Ok(entry)
            }
            Plan::Lead(rx) => await_own_scan(key, rx).await,
            Plan::Join(rx) => {
                log::info!("Scan already in progress for {}, waiting", key);
                self.await_foreign_scan(key, rx).await
            }
        }
    }

    /// The cached entry for `key`, if it has not expired.
    pub fn get_cached(&self, key: &ScanKey) -> Option<Arc<ScanEntry>> {
        self.state.lock().fresh_entry(key, Utc::now())
    }

    pub fn is_in_flight(&self, key: &ScanKey) -> bool {
        self.state.lock().in_flight.contains_key(key)
    }

    /// Age and remaining lifetime of every cached entry, sorted by key.
    pub fn cache_info(&self) -> CacheInfo {
        let now = Utc::now();
        let state = self.state.lock();

        let mut entries: Vec<CacheEntryInfo> = state
            .entries
            .values()
            .map(|entry| CacheEntryInfo {
                key: entry.key.clone(),
                age_seconds: seconds_between(entry.produced_at, now),
                expires_in_seconds: seconds_between(now, entry.expires_at),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        CacheInfo {
            total_cached_entries: entries.len(),
            ttl_seconds: self.settings.ttl.as_secs(),
            entries,
        }
    }

    /// Evict one entry, or every entry when `key` is `None`. Returns the
    /// number of entries removed. Scans in flight are not affected.
    pub fn invalidate(&self, key: Option<&ScanKey>) -> usize {
        let mut state = self.state.lock();
        let removed = match key {
            Some(key) => usize::from(state.entries.remove(key).is_some()),
            None => {
                let count = state.entries.len();
                state.entries.clear();
                count
            }
        };

        match key {
            Some(key) => log::info!("Scan cache cleared for {} ({} removed)", key, removed),
            None => log::info!("All scan cache cleared ({} removed)", removed),
        }
        removed
    }

    fn spawn_scan(&self, key: ScanKey, tx: watch::Sender<Outcome>) {
        let invoker = Arc::clone(&self.invoker);
        let settings = self.settings;
        let guard = InFlightGuard {
            state: Arc::clone(&self.state),
            key: key.clone(),
            tx: Some(tx),
        };

        tokio::spawn(async move {
            let outcome = run_scan(invoker.as_ref(), &key, settings).await;
            guard.complete(outcome);
        });
    }

    async fn await_foreign_scan(
        &self,
        key: &ScanKey,
        mut rx: watch::Receiver<Outcome>,
    ) -> Result<Arc<ScanEntry>> {
        let deadline = Instant::now() + self.settings.wait_timeout;

        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(outcome) = current {
                return outcome;
            }

            let now = Instant::now();
            if now >= deadline {
                log::warn!(
                    "Gave up waiting on in-flight scan for {} after {}s",
                    key,
                    self.settings.wait_timeout.as_secs()
                );
                return Err(KdashError::WaitTimedOut(self.settings.wait_timeout.as_secs()));
            }

            let slice = self.settings.effective_poll_interval().min(deadline - now);
            if let Ok(Err(_)) = timeout(slice, rx.changed()).await {
                return closed_outcome(key, &rx);
            }
        }
    }
}

async fn await_own_scan(key: &ScanKey, mut rx: watch::Receiver<Outcome>) -> Result<Arc<ScanEntry>> {
    loop {
        let current = rx.borrow_and_update().clone();
        if let Some(outcome) = current {
            return outcome;
        }
        if rx.changed().await.is_err() {
            return closed_outcome(key, &rx);
        }
    }
}

/// The sender is gone: either it published right before closing, or the
/// scan task died without reporting.
fn closed_outcome(key: &ScanKey, rx: &watch::Receiver<Outcome>) -> Result<Arc<ScanEntry>> {
    rx.borrow().clone().unwrap_or_else(|| {
        Err(KdashError::unknown(format!(
            "scan task for {} ended without a result",
            key
        )))
    })
}

async fn run_scan(
    invoker: &dyn ScanInvoker,
    key: &ScanKey,
    settings: CoordinatorSettings,
) -> Result<Arc<ScanEntry>> {
    let started = Instant::now();
    let raw = match timeout(settings.scan_timeout, invoker.invoke(key, settings.scan_timeout)).await {
        Ok(result) => result?,
        Err(_) => return Err(KdashError::ScanTimedOut(settings.scan_timeout.as_secs())),
    };

    let report = report::parse_output(raw.as_bytes())?;
    let entry = ScanEntry::new(key.clone(), Utc::now(), settings.ttl, report);

    log::info!(
        "Scan completed for {} in {:.1}s: critical={} high={} medium={} low={}",
        key,
        started.elapsed().as_secs_f64(),
        entry.severity_counts.critical,
        entry.severity_counts.high,
        entry.severity_counts.medium,
        entry.severity_counts.low
    );
    Ok(Arc::new(entry))
}

/// Releases the in-flight slot exactly once, publishing the outcome. If the
/// scan task unwinds before `complete`, waiters get an `Unknown` error.
struct InFlightGuard {
    state: Arc<Mutex<ScanState>>,
    key: ScanKey,
    tx: Option<watch::Sender<Outcome>>,
}

impl InFlightGuard {
    fn complete(mut self, outcome: Result<Arc<ScanEntry>>) {
        self.publish(outcome);
    }

    fn publish(&mut self, outcome: Result<Arc<ScanEntry>>) {
        let Some(tx) = self.tx.take() else {
            return;
        };

        let mut state = self.state.lock();
        match &outcome {
            Ok(entry) => {
                state.entries.insert(self.key.clone(), Arc::clone(entry));
            }
            Err(e) => log::warn!("Scan for {} failed, nothing cached: {}", self.key, e),
        }
        state.in_flight.remove(&self.key);
        tx.send_replace(Some(outcome));
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.publish(Err(KdashError::unknown(format!(
                "scan task for {} aborted",
                self.key
            ))));
        }
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_seconds()).unwrap_or(0)
}
