use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{MonitorError, Result};

/// Real-time monitor for NVIDIA GPU throttle/event reasons
#[derive(Parser, Debug, Clone)]
#[command(name = "gpu-throttle", version, about)]
pub struct Args {
    /// Sampling interval in seconds
    #[arg(long, default_value_t = 1.0)]
    pub interval: f64,

    /// Run for N seconds then exit (0 = until Ctrl-C)
    #[arg(long, default_value_t = 0.0)]
    pub duration: f64,

    /// Comma-separated GPU indices to watch, or "all"
    #[arg(long, default_value = "all")]
    pub gpus: String,

    /// Optional path to save a CSV log
    #[arg(long, default_value = "")]
    pub csv: String,
}

/// Which devices to watch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GpuSelection {
    All,
    Indices(Vec<u32>),
}

impl GpuSelection {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("all") {
            return Ok(GpuSelection::All);
        }

        let mut indices = Vec::new();
        for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let index: u32 = item
                .parse()
                .map_err(|_| MonitorError::invalid_config(format!("bad GPU index '{}'", item)))?;
            if !indices.contains(&index) {
                indices.push(index);
            }
        }

        if indices.is_empty() {
            return Err(MonitorError::invalid_config("no GPU indices given"));
        }
        Ok(GpuSelection::Indices(indices))
    }

    /// Concrete indices given `count` visible devices
    pub fn resolve(&self, count: u32) -> Result<Vec<u32>> {
        match self {
            GpuSelection::All => Ok((0..count).collect()),
            GpuSelection::Indices(indices) => {
                if let Some(&index) = indices.iter().find(|&&i| i >= count) {
                    return Err(MonitorError::UnknownDevice { index, count });
                }
                Ok(indices.clone())
            }
        }
    }
}

/// Validated run settings
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// `None` runs until interrupted
    pub duration: Option<Duration>,
    pub gpus: GpuSelection,
    pub csv: Option<PathBuf>,
}

impl MonitorConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        if !args.interval.is_finite() || args.interval <= 0.0 {
            return Err(MonitorError::invalid_config(format!(
                "--interval must be a positive number of seconds, got {}",
                args.interval
            )));
        }
        if !args.duration.is_finite() || args.duration < 0.0 {
            return Err(MonitorError::invalid_config(format!(
                "--duration must be zero or a positive number of seconds, got {}",
                args.duration
            )));
        }

        let duration = if args.duration > 0.0 {
            Some(Duration::from_secs_f64(args.duration))
        } else {
            None
        };
        let csv = match args.csv.trim() {
            "" => None,
            path => Some(PathBuf::from(path)),
        };

        Ok(Self {
            interval: Duration::from_secs_f64(args.interval),
            duration,
            gpus: GpuSelection::parse(&args.gpus)?,
            csv,
        })
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            duration: None,
            gpus: GpuSelection::All,
            csv: None,
        }
    }
}
