//! External scanner invocation.
//!
//! The scanner is a black box: a process that is handed one subject and
//! prints a JSON document. Every run is preceded by a cheap `--version`
//! preflight so an absent or broken installation fails fast.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::config::Config;
use crate::core::subject::ScanKey;
use crate::error::{KdashError, Result};

/// Stdout of a successful scanner run, not yet parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawScanOutput(pub Vec<u8>);

impl RawScanOutput {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for RawScanOutput {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for RawScanOutput {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

/// Runs one scan for one subject within a wall-clock budget.
#[async_trait]
pub trait ScanInvoker: Send + Sync {
    async fn invoke(&self, key: &ScanKey, budget: Duration) -> Result<RawScanOutput>;
}

/// Invokes the `trivy` CLI as a child process.
#[derive(Debug, Clone)]
pub struct TrivyInvoker {
    program: String,
    preflight_timeout: Duration,
}

impl TrivyInvoker {
    pub fn new<S: Into<String>>(program: S, preflight_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            preflight_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.scanner_path.clone(), config.preflight_timeout())
    }

    /// Locate the scanner executable on PATH (or verify an explicit path).
    fn resolve(&self) -> Result<PathBuf> {
        which::which(&self.program).map_err(|e| {
            KdashError::scanner_unavailable(format!("{} not found: {}", self.program, e))
        })
    }

    /// Verify that the scanner starts and answers `--version` in time.
    async fn preflight(&self, binary: &Path) -> Result<()> {
        let mut cmd = Command::new(binary);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match timeout(self.preflight_timeout, cmd.output()).await {
            Err(_) => Err(KdashError::scanner_unavailable(format!(
                "{} --version did not answer within {}s",
                binary.display(),
                self.preflight_timeout.as_secs()
            ))),
            Ok(Err(e)) => Err(KdashError::scanner_unavailable(format!(
                "failed to start {}: {}",
                binary.display(),
                e
            ))),
            Ok(Ok(output)) if !output.status.success() => {
                Err(KdashError::scanner_unavailable(format!(
                    "{} --version exited with {}: {}",
                    binary.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )))
            }
            Ok(Ok(output)) => {
                log::debug!(
                    "Scanner preflight ok: {}",
                    String::from_utf8_lossy(&output.stdout).lines().next().unwrap_or("")
                );
                Ok(())
            }
        }
    }

    async fn run_scan(&self, binary: &Path, key: &ScanKey, budget: Duration) -> Result<Output> {
        let mut cmd = Command::new(binary);
        cmd.arg("image")
            .arg("--format")
            .arg("json")
            .arg("--quiet")
            .arg(key.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the child on timeout kills it
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            KdashError::scanner_unavailable(format!("failed to start {}: {}", binary.display(), e))
        })?;
        let pid = child.id();

        match timeout(budget, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(KdashError::unknown(format!(
                "failed to collect scanner output: {}",
                e
            ))),
            Err(_) => {
                log::warn!(
                    "Scan of {} exceeded {}s, killed scanner process {:?}",
                    key,
                    budget.as_secs(),
                    pid
                );
                Err(KdashError::ScanTimedOut(budget.as_secs()))
            }
        }
    }
}

#[async_trait]
impl ScanInvoker for TrivyInvoker {
    async fn invoke(&self, key: &ScanKey, budget: Duration) -> Result<RawScanOutput> {
        let binary = self.resolve()?;
        self.preflight(&binary).await?;

        log::info!("Starting security scan for image: {}", key);
        let output = self.run_scan(&binary, key, budget).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let err = classify_failure(key, stderr.trim());
            log::error!("Scan of {} failed: {}", key, err);
            return Err(err);
        }

        Ok(RawScanOutput(output.stdout))
    }
}

/// Map a failed run's stderr to an error kind.
pub fn classify_failure(key: &ScanKey, stderr: &str) -> KdashError {
    let lower = stderr.to_lowercase();
    let message = if stderr.is_empty() {
        "unknown error".to_string()
    } else {
        stderr.to_string()
    };

    if lower.contains("manifest_unknown")
        || lower.contains("manifest unknown")
        || lower.contains("no such image")
        || lower.contains("not found")
    {
        KdashError::subject_not_found(format!("{}: {}", key, message))
    } else if lower.contains("unauthorized")
        || lower.contains("denied")
        || lower.contains("permission")
    {
        KdashError::permission_denied(format!("{}: {}", key, message))
    } else {
        KdashError::unknown(format!("security scan failed: {}", message))
    }
}
