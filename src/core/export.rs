//! Severity rollups and export of scan entries.
//!
//! Everything here is a pure function of its input.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;
use std::str::FromStr;

use crate::core::scanner::{ScanEntry, SeverityCounts};
use crate::core::subject::ScanKey;
use crate::error::{KdashError, Result};

const CSV_HEADER: &str = "Severity,Vulnerability,Package,Installed Version,Fixed Version";

/// Rollup of a single scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub image: ScanKey,
    pub timestamp: DateTime<Utc>,
    pub vulnerabilities: SeverityCounts,
    pub total_vulnerabilities: u32,
    pub has_critical: bool,
    pub has_high: bool,
}

pub fn summarize(entry: &ScanEntry) -> ScanSummary {
    let counts = entry.severity_counts;
    ScanSummary {
        image: entry.key.clone(),
        timestamp: entry.produced_at,
        vulnerabilities: counts,
        total_vulnerabilities: counts.total(),
        has_critical: counts.critical > 0,
        has_high: counts.high > 0,
    }
}

/// Rollup over several scans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub subjects: usize,
    pub vulnerabilities: SeverityCounts,
    pub total_vulnerabilities: u32,
    pub subjects_with_critical: usize,
    pub subjects_with_high: usize,
}

pub fn summarize_all<'a, I>(entries: I) -> FleetSummary
where
    I: IntoIterator<Item = &'a ScanEntry>,
{
    let mut fleet = FleetSummary::default();
    for entry in entries {
        fleet.subjects += 1;
        fleet.vulnerabilities.merge(&entry.severity_counts);
        if entry.severity_counts.critical > 0 {
            fleet.subjects_with_critical += 1;
        }
        if entry.severity_counts.high > 0 {
            fleet.subjects_with_high += 1;
        }
    }
    fleet.total_vulnerabilities = fleet.vulnerabilities.total();
    fleet
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = KdashError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(KdashError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// A rendered export, ready to be written out or attached to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedScan {
    pub content_type: &'static str,
    pub file_name: String,
    pub body: Vec<u8>,
}

pub fn export(entry: &ScanEntry, format: ExportFormat) -> Result<ExportedScan> {
    let body = match format {
        ExportFormat::Json => serde_json::to_vec_pretty(entry)
            .map_err(|e| KdashError::unknown(format!("failed to serialize scan: {}", e)))?,
        ExportFormat::Csv => to_csv(entry).into_bytes(),
    };

    Ok(ExportedScan {
        content_type: format.content_type(),
        file_name: format!("scan_results.{}", format.extension()),
        body,
    })
}

/// One row per finding, header first. No findings means header only.
pub fn to_csv(entry: &ScanEntry) -> String {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');

    for finding in &entry.findings {
        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{}",
            csv_escape(&finding.severity.to_string()),
            csv_escape(&finding.id),
            csv_escape(&finding.package),
            csv_escape(&finding.installed_version),
            csv_escape(&finding.fixed_version),
        );
    }

    out
}

fn csv_escape(s: &str) -> String {
    let needs_quoting = s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r');
    let has_formula_prefix = matches!(s.as_bytes().first(), Some(b'=' | b'+' | b'-' | b'@' | b'\t' | b'\r'));

    if has_formula_prefix {
        // Neutralize spreadsheet formula interpretation
        format!("\"'{}\"", s.replace('"', "\"\""))
    } else if needs_quoting {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
