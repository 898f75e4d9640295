// kdash Library - Public API

// Re-export error types
pub mod error;
pub use error::{KdashError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod ui;

// Re-export commonly used types
pub use core::config::Config;

/// Initialize logging. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A second initialization (e.g. from tests) is harmless
    let _ = env_logger::Builder::from_env(env).try_init();
}
