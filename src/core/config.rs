//! Runtime configuration: JSON file plus environment overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{KdashError, Result};

const DEFAULT_SCANNER_PATH: &str = "trivy";
const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 300;
const DEFAULT_PREFLIGHT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SCAN_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_METRICS_TTL_SECS: u64 = 5;
const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Runtime configuration for the scan coordinator and the metrics cache.
///
/// Durations are stored as plain integers so the JSON file stays readable;
/// use the accessor methods to get `Duration`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scanner executable, either a bare name looked up on PATH or a path
    pub scanner_path: String,
    pub scan_timeout_secs: u64,
    pub preflight_timeout_secs: u64,
    pub scan_cache_ttl_secs: u64,
    /// How long a caller waits on somebody else's in-flight scan
    pub wait_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub metrics_ttl_secs: u64,
    pub history_limit: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scanner_path: DEFAULT_SCANNER_PATH.to_string(),
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            preflight_timeout_secs: DEFAULT_PREFLIGHT_TIMEOUT_SECS,
            scan_cache_ttl_secs: DEFAULT_SCAN_CACHE_TTL_SECS,
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            metrics_ttl_secs: DEFAULT_METRICS_TTL_SECS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| {
            KdashError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        // An empty file is treated like a missing one
        if data.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_json::from_str(&data).map_err(|e| {
            KdashError::config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load the default config file if it exists, otherwise use defaults.
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Config::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                KdashError::config(format!(
                    "Failed to create config directory {:?}: {}",
                    parent, e
                ))
            })?;
        }

        let data = serde_json::to_string_pretty(self)
            .map_err(|e| KdashError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, data).map_err(|e| {
            KdashError::config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// `<config_dir>/kdash/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kdash").join("config.json"))
    }

    /// Overlay values from the process environment.
    pub fn from_env(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay values from any variable source. Unparsable numbers are errors.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("TRIVY_PATH") {
            self.scanner_path = path;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }

        override_number(&lookup, "SCAN_TIMEOUT", &mut self.scan_timeout_secs)?;
        override_number(&lookup, "SCAN_CACHE_TTL", &mut self.scan_cache_ttl_secs)?;
        override_number(&lookup, "SCAN_WAIT_TIMEOUT", &mut self.wait_timeout_secs)?;
        override_number(&lookup, "METRICS_INTERVAL", &mut self.metrics_ttl_secs)?;
        override_number(&lookup, "METRICS_HISTORY_LIMIT", &mut self.history_limit)?;

        Ok(self)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_secs(self.preflight_timeout_secs)
    }

    pub fn scan_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.scan_cache_ttl_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn metrics_ttl(&self) -> Duration {
        Duration::from_secs(self.metrics_ttl_secs)
    }
}

fn override_number<F, T>(lookup: &F, name: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(name) {
        *target = raw.trim().parse().map_err(|_| {
            KdashError::config(format!("{} must be a non-negative integer, got {:?}", name, raw))
        })?;
    }
    Ok(())
}
