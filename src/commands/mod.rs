// Command handlers module
pub mod export;
pub mod metrics;
pub mod scan;

// Re-exports for cleaner imports
pub use export::execute as export;
pub use metrics::execute as metrics;
pub use scan::execute as scan;
