// Core business logic module

pub mod config;
pub mod export;
pub mod scanner;
pub mod subject;
pub mod system_monitor;

// Re-export commonly used items
pub use config::Config;
pub use export::{export, summarize, summarize_all, ExportFormat, ExportedScan, FleetSummary, ScanSummary};
pub use scanner::{ScanCoordinator, ScanEntry, TrivyInvoker};
pub use subject::ScanKey;
pub use system_monitor::{MetricsCache, SysinfoSampler};
