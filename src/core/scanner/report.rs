//! Structured view over raw scanner output.
//!
//! Only the fields needed for severity rollups and tabular export are
//! extracted; the raw document is kept alongside as opaque detail.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{KdashError, Result};

/// Severity of a single finding.
///
/// Anything outside the four recognised levels is kept verbatim in
/// `Other` so it can be counted separately instead of being folded into
/// one of the official buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Other(String),
}

impl Severity {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Other(raw.to_string()),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Severity::Other(_))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => f.write_str("CRITICAL"),
            Severity::High => f.write_str("HIGH"),
            Severity::Medium => f.write_str("MEDIUM"),
            Severity::Low => f.write_str("LOW"),
            Severity::Other(raw) => f.write_str(raw),
        }
    }
}

/// One vulnerability reported against one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub id: String,
    pub package: String,
    pub installed_version: String,
    pub fixed_version: String,
}

/// Per-severity counts. `unrecognized` is never part of `total()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    #[serde(default)]
    pub unrecognized: u32,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: &Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Other(_) => self.unrecognized += 1,
        }
    }

    /// Sum of the four recognised buckets.
    pub fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low
    }

    pub fn merge(&mut self, other: &SeverityCounts) {
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.unrecognized += other.unrecognized;
    }
}

/// Parsed scanner output.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub counts: SeverityCounts,
    pub findings: Vec<Finding>,
    pub raw: Value,
}

impl ScanReport {
    pub fn from_findings(findings: Vec<Finding>, raw: Value) -> Self {
        let mut counts = SeverityCounts::default();
        for finding in &findings {
            counts.record(&finding.severity);
        }
        Self { counts, findings, raw }
    }
}

/// Parse the scanner's JSON stdout.
pub fn parse_output(stdout: &[u8]) -> Result<ScanReport> {
    let raw: Value = serde_json::from_slice(stdout)
        .map_err(|e| KdashError::malformed_output(format!("scanner output is not JSON: {}", e)))?;
    parse_value(raw)
}

/// Extract findings from a parsed document.
///
/// Accepts both the legacy top-level array of results and the current
/// `{"Results": [...]}` object. A `null` document (nothing scanned) is an
/// empty report.
pub fn parse_value(raw: Value) -> Result<ScanReport> {
    let results: &[Value] = match &raw {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("Results") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => &[],
            Some(other) => {
                return Err(KdashError::malformed_output(format!(
                    "\"Results\" should be an array, found {}",
                    type_name(other)
                )))
            }
        },
        Value::Null => &[],
        other => {
            return Err(KdashError::malformed_output(format!(
                "expected an array or object, found {}",
                type_name(other)
            )))
        }
    };

    let mut findings = Vec::new();
    for result in results {
        let vulnerabilities = match result.get("Vulnerabilities") {
            Some(Value::Array(items)) => items,
            _ => continue,
        };

        for vuln in vulnerabilities {
            if !vuln.is_object() {
                return Err(KdashError::malformed_output(format!(
                    "vulnerability entry should be an object, found {}",
                    type_name(vuln)
                )));
            }
            findings.push(Finding {
                severity: Severity::parse(field(vuln, "Severity")),
                id: field(vuln, "VulnerabilityID").to_string(),
                package: field(vuln, "PkgName").to_string(),
                installed_version: field(vuln, "InstalledVersion").to_string(),
                fixed_version: field(vuln, "FixedVersion").to_string(),
            });
        }
    }

    Ok(ScanReport::from_findings(findings, raw))
}

fn field<'a>(value: &'a Value, name: &str) -> &'a str {
    value.get(name).and_then(Value::as_str).unwrap_or("")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
