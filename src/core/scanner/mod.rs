//! Vulnerability scan orchestration.
//!
//! The coordinator fronts a slow external scanner with a TTL cache and
//! collapses concurrent requests for the same subject into one scan.

pub mod coordinator;
pub mod invoker;
pub mod report;

pub use coordinator::{CacheEntryInfo, CacheInfo, CoordinatorSettings, ScanCoordinator, ScanEntry};
pub use invoker::{classify_failure, RawScanOutput, ScanInvoker, TrivyInvoker};
pub use report::{parse_output, parse_value, Finding, ScanReport, Severity, SeverityCounts};
