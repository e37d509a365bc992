use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::diagnosis::describe;
use crate::error::{MonitorError, Result};
use crate::models::DeviceSnapshot;

pub const CSV_HEADER: &str = "timestamp,gpu,power_w,sm_mhz,util_pct,temp_c,mask_hex,problems";

/// One logged sample
pub struct SampleRecord<'a> {
    pub timestamp: DateTime<Local>,
    pub index: u32,
    pub snapshot: &'a DeviceSnapshot,
}

impl SampleRecord<'_> {
    /// The CSV row, without a trailing newline
    pub fn to_row(&self) -> String {
        let s = self.snapshot;
        format!(
            "{},{},{:.2},{},{},{:.1},0x{:016x},{}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f"),
            self.index,
            s.power_watts,
            s.sm_clock_mhz,
            s.utilization_percent,
            s.temperature_celsius,
            s.reason_mask,
            describe(s.reason_mask)
        )
    }
}

/// Append-only CSV sink. Every record is flushed as it is written.
pub struct SampleLogger<W: Write = Box<dyn Write>> {
    path: PathBuf,
    out: W,
    records: u64,
}

impl SampleLogger {
    /// Creates (truncating) `path` and writes the header line
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(MonitorError::LogWriteFailed)?;
        Self::from_writer(Box::new(BufWriter::new(file)), path.to_path_buf())
    }
}

impl<W: Write> SampleLogger<W> {
    /// Logs to an already open writer. `path` is only reported back.
    pub fn from_writer(out: W, path: PathBuf) -> Result<Self> {
        let mut logger = Self {
            path,
            out,
            records: 0,
        };
        logger.write_line(CSV_HEADER)?;
        Ok(logger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far, header excluded
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn write(&mut self, record: &SampleRecord<'_>) -> Result<()> {
        self.write_line(&record.to_row())?;
        self.records += 1;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}", line).map_err(MonitorError::LogWriteFailed)?;
        self.out.flush().map_err(MonitorError::LogWriteFailed)
    }

    pub fn close(mut self) -> Result<PathBuf> {
        self.out.flush().map_err(MonitorError::LogWriteFailed)?;
        log::info!("sample log closed after {} records", self.records);
        Ok(self.path)
    }
}
