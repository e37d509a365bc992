use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Local;
use tokio::time::Instant;

use crate::config::MonitorConfig;
use crate::diagnosis::is_throttled;
use crate::error::{MonitorError, Result};
use crate::history::HistoryTracker;
use crate::logger::{SampleLogger, SampleRecord};
use crate::models::{DeviceIdentity, DeviceSnapshot};
use crate::screen::Screen;
use crate::signal::StopToken;
use crate::source::MetricsSource;
use crate::summary::{DeviceReport, Summary};
use crate::theme::Palette;
use crate::ui::{build_frame, FrameInput};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Running,
    Stopping,
    Terminated,
}

/// Why the loop left `Running`
#[derive(Debug)]
pub enum StopReason {
    Interrupted,
    DeadlineReached,
    /// A fatal error. Shutdown and the summary still ran.
    Failed(MonitorError),
}

#[derive(Debug)]
pub struct RunReport {
    pub reason: StopReason,
    pub ticks: u64,
    pub summary: Summary,
}

/// Main application state
pub struct App {
    config: MonitorConfig,
    source: Box<dyn MetricsSource>,
    logger: Option<SampleLogger>,
    devices: Vec<DeviceIdentity>,
    history: HistoryTracker,
    palette: Palette,
    stop: StopToken,
    started: Instant,
    deadline: Option<Instant>,
    phase: Phase,
    ticks: u64,
}

impl App {
    /// Resolves the watched devices and opens the sample log. Any failure
    /// here is fatal and closes the source before returning.
    pub fn new(
        config: MonitorConfig,
        mut source: Box<dyn MetricsSource>,
        palette: Palette,
        stop: StopToken,
    ) -> Result<Self> {
        let devices = match resolve_devices(source.as_ref(), &config) {
            Ok(devices) => devices,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };

        let logger = match config.csv.as_deref().map(SampleLogger::create).transpose() {
            Ok(logger) => logger,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };

        log::info!(
            "watching {} GPU(s) via {} every {:?}",
            devices.len(),
            source.label(),
            config.interval
        );

        let started = Instant::now();
        let deadline = config.duration.map(|d| started + d);

        Ok(App {
            config,
            source,
            logger,
            devices,
            history: HistoryTracker::new(),
            palette,
            stop,
            started,
            deadline,
            phase: Phase::Running,
            ticks: 0,
        })
    }

    /// Sends samples to `logger` instead of the log opened from the config
    pub fn with_logger(mut self, logger: SampleLogger) -> Self {
        self.close_logger();
        self.logger = Some(logger);
        self
    }

    pub fn devices(&self) -> &[DeviceIdentity] {
        &self.devices
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// One sample/record/render pass over every watched device. A device
    /// whose sample fails is left out of this tick entirely.
    pub fn tick(&mut self, screen: &mut dyn Screen) -> Result<()> {
        let now = Local::now();
        let (width, height) = screen.size();
        let mut snapshots: BTreeMap<u32, DeviceSnapshot> = BTreeMap::new();

        for device in &self.devices {
            let snapshot = match self.source.sample(device.index) {
                Ok(snapshot) => snapshot,
                Err(e) if e.is_recoverable() => {
                    log::debug!("skipping GPU {} this tick: {}", device.index, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.history
                .append(device.index, is_throttled(snapshot.reason_mask));
            if let Some(logger) = self.logger.as_mut() {
                logger.write(&SampleRecord {
                    timestamp: now,
                    index: device.index,
                    snapshot: &snapshot,
                })?;
            }
            snapshots.insert(device.index, snapshot);
        }

        let frame = build_frame(
            &FrameInput {
                devices: &self.devices,
                snapshots: &snapshots,
                history: &self.history,
                width,
                height,
                uptime: self.started.elapsed(),
                backend: self.source.label(),
            },
            &self.palette,
        );
        screen.present(frame).map_err(MonitorError::Terminal)?;

        self.ticks += 1;
        Ok(())
    }

    /// Ticks until interrupted, the deadline passes, or a fatal error, then
    /// shuts down and builds the summary.
    pub async fn run(&mut self, screen: &mut dyn Screen) -> RunReport {
        let reason = loop {
            if self.stop.is_requested() {
                break StopReason::Interrupted;
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                break StopReason::DeadlineReached;
            }

            if let Err(e) = self.tick(screen) {
                break StopReason::Failed(e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = self.stop.requested() => {}
            }
        };

        self.phase = Phase::Stopping;
        match &reason {
            StopReason::Failed(e) => log::error!("stopping after fatal error: {}", e),
            other => log::info!("stopping: {:?} after {} ticks", other, self.ticks),
        }

        let summary = self.shutdown(screen);
        self.phase = Phase::Terminated;

        RunReport {
            reason,
            ticks: self.ticks,
            summary,
        }
    }

    /// Restores the terminal, closes the log, re-samples every device once
    /// for the summary and finally closes the source.
    fn shutdown(&mut self, screen: &mut dyn Screen) -> Summary {
        if let Err(e) = screen.restore() {
            log::warn!("failed to restore terminal: {}", e);
        }

        let log_path = self.close_logger();

        let mut devices = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            match self.source.sample(device.index) {
                Ok(snapshot) => devices.push(DeviceReport {
                    identity: device.clone(),
                    snapshot,
                }),
                Err(e) => log::debug!("final sample of GPU {} skipped: {}", device.index, e),
            }
        }

        self.source.close();

        Summary {
            runtime: self.started.elapsed(),
            devices,
            log_path,
        }
    }

    fn close_logger(&mut self) -> Option<PathBuf> {
        let logger = self.logger.take()?;
        let path = logger.path().to_path_buf();
        if let Err(e) = logger.close() {
            log::error!("{}", e);
        }
        Some(path)
    }

    /// Releases the source and log without running, for startup paths that
    /// fail after the app was built
    pub fn abort(mut self) {
        self.close_logger();
        self.source.close();
    }
}

fn resolve_devices(
    source: &dyn MetricsSource,
    config: &MonitorConfig,
) -> Result<Vec<DeviceIdentity>> {
    let count = source.count()?;
    if count == 0 {
        return Err(MonitorError::source_unavailable("no GPUs found"));
    }

    let indices = config.gpus.resolve(count)?;
    Ok(indices
        .into_iter()
        .map(|index| {
            let name = source.name(index).unwrap_or_else(|e| {
                log::warn!("{}", e);
                format!("GPU {}", index)
            });
            DeviceIdentity::new(index, name)
        })
        .collect())
}
