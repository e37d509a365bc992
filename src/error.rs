use std::io;
use thiserror::Error;

/// Errors raised while monitoring
#[derive(Error, Debug)]
pub enum MonitorError {
    /// No backend could enumerate devices. Fatal at startup.
    #[error("unable to query GPUs ({0}). Is the NVIDIA driver loaded?")]
    SourceUnavailable(String),

    /// One device could not be read this tick. The loop skips it and moves on.
    #[error("failed to sample GPU {index}: {reason}")]
    SampleFailed { index: u32, reason: String },

    #[error("GPU {index} not present ({count} device(s) found)")]
    UnknownDevice { index: u32, count: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to write sample log: {0}")]
    LogWriteFailed(#[source] io::Error),

    #[error("terminal error: {0}")]
    Terminal(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        MonitorError::SourceUnavailable(msg.into())
    }

    pub fn sample_failed<S: Into<String>>(index: u32, reason: S) -> Self {
        MonitorError::SampleFailed {
            index,
            reason: reason.into(),
        }
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        MonitorError::InvalidConfig(msg.into())
    }

    /// Whether the run can continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MonitorError::SampleFailed { .. })
    }
}
