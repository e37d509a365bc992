//! Real-time terminal monitor that explains why NVIDIA GPUs are throttling.

pub mod app;
pub mod config;
pub mod diagnosis;
pub mod error;
pub mod history;
pub mod logger;
pub mod models;
pub mod nvidia;
#[cfg(feature = "nvml")]
pub mod nvml;
pub mod screen;
pub mod signal;
pub mod source;
pub mod summary;
pub mod theme;
pub mod ui;

pub use error::{MonitorError, Result};

/// Logs go to stderr, `warn` and up unless `RUST_LOG` says otherwise
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}
