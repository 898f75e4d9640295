// Test doubles shared by the integration tests

use async_trait::async_trait;
use kdash::core::scanner::{RawScanOutput, ScanInvoker};
use kdash::core::ScanKey;
use kdash::{KdashError, Result};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub enum Behavior {
    /// Answer the n-th call with `responses[n]`; the last one repeats
    Respond(Vec<String>),
    Fail(KdashError),
    Hang,
}

/// Scanner stand-in that counts invocations.
pub struct StubInvoker {
    calls: AtomicUsize,
    delay: Duration,
    behavior: Behavior,
}

impl StubInvoker {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            behavior,
        }
    }

    pub fn responding(body: String) -> Self {
        Self::new(Behavior::Respond(vec![body]))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanInvoker for StubInvoker {
    async fn invoke(&self, _key: &ScanKey, _budget: Duration) -> Result<RawScanOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        match &self.behavior {
            Behavior::Respond(responses) => {
                let body = responses
                    .get(call)
                    .or_else(|| responses.last())
                    .cloned()
                    .unwrap_or_default();
                Ok(RawScanOutput::from(body))
            }
            Behavior::Fail(err) => Err(err.clone()),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

/// Scanner JSON with the given number of findings per severity.
pub fn trivy_json(critical: usize, high: usize, medium: usize, low: usize) -> String {
    let mut vulnerabilities = Vec::new();
    let mut next_id = 0;
    for (severity, count) in [
        ("CRITICAL", critical),
        ("HIGH", high),
        ("MEDIUM", medium),
        ("LOW", low),
    ] {
        for _ in 0..count {
            next_id += 1;
            vulnerabilities.push(json!({
                "VulnerabilityID": format!("CVE-2024-{:04}", next_id),
                "PkgName": "openssl",
                "InstalledVersion": "3.0.11-1",
                "FixedVersion": "3.0.13-1",
                "Severity": severity,
            }));
        }
    }

    json!({
        "SchemaVersion": 2,
        "Results": [ { "Target": "debian 12", "Vulnerabilities": vulnerabilities } ]
    })
    .to_string()
}
