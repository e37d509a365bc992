use std::process::Command;

use crate::error::{MonitorError, Result};
use crate::models::DeviceSnapshot;
use crate::source::MetricsSource;

const SAMPLE_QUERY: &str = "--query-gpu=power.draw,clocks.current.sm,utilization.gpu,clocks_throttle_reasons.active,temperature.gpu";

/// Metrics read by spawning `nvidia-smi` once per query
pub struct SmiSource {
    program: String,
}

impl SmiSource {
    pub fn new() -> Self {
        Self::with_program("nvidia-smi")
    }

    /// Use a different executable, e.g. a wrapper script
    pub fn with_program<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> std::result::Result<String, String> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| format!("{}: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout).map_err(|e| e.to_string())
    }
}

impl Default for SmiSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SmiSource {
    fn label(&self) -> &'static str {
        "nvidia-smi"
    }

    fn count(&self) -> Result<u32> {
        let out = self
            .run(&["--query-gpu=index", "--format=csv,noheader"])
            .map_err(MonitorError::source_unavailable)?;
        Ok(out.lines().filter(|l| !l.trim().is_empty()).count() as u32)
    }

    fn name(&self, index: u32) -> Result<String> {
        let id = format!("--id={}", index);
        let out = self
            .run(&[id.as_str(), "--query-gpu=name", "--format=csv,noheader"])
            .map_err(|e| MonitorError::sample_failed(index, e))?;
        Ok(out.trim().to_string())
    }

    fn sample(&self, index: u32) -> Result<DeviceSnapshot> {
        let id = format!("--id={}", index);
        let out = self
            .run(&[id.as_str(), SAMPLE_QUERY, "--format=csv,noheader,nounits"])
            .map_err(|e| MonitorError::sample_failed(index, e))?;
        parse_sample_line(out.trim()).map_err(|e| MonitorError::sample_failed(index, e))
    }

    fn close(&mut self) {}
}

/// Parses one `power,sm,util,reasons,temp` row. Blank fields and bracketed
/// placeholders such as `[N/A]` or `[Not Supported]` read as zero; the reason
/// mask is hexadecimal.
pub fn parse_sample_line(line: &str) -> std::result::Result<DeviceSnapshot, String> {
    let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
    if parts.len() < 4 {
        return Err(format!("expected at least 4 fields, got '{}'", line));
    }

    let power_watts: f64 = parse_field(parts[0], "power.draw", |s| s.parse().ok())?;
    let sm_clock_mhz: u32 = parse_field(parts[1], "clocks.current.sm", |s| s.parse().ok())?;
    let utilization_percent: u32 = parse_field(parts[2], "utilization.gpu", |s| s.parse().ok())?;
    let reason_mask: u64 = parse_field(parts[3], "clocks_throttle_reasons.active", |s| {
        let hex = s.trim_start_matches("0x").trim_start_matches("0X");
        u64::from_str_radix(hex, 16).ok()
    })?;
    let temperature_celsius: f64 = match parts.get(4) {
        Some(field) => parse_field(field, "temperature.gpu", |s| s.parse().ok())?,
        None => 0.0,
    };

    Ok(DeviceSnapshot {
        power_watts,
        sm_clock_mhz,
        utilization_percent,
        reason_mask,
        temperature_celsius,
    })
}

fn parse_field<T: Default>(
    raw: &str,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> std::result::Result<T, String> {
    if raw.is_empty() || (raw.starts_with('[') && raw.ends_with(']')) {
        return Ok(T::default());
    }
    parse(raw).ok_or_else(|| format!("bad {} value '{}'", name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_row() {
        let snap = parse_sample_line("245.67, 1980, 99, 0x0000000000000004, 71").unwrap();
        assert!((snap.power_watts - 245.67).abs() < 1e-9);
        assert_eq!(snap.sm_clock_mhz, 1980);
        assert_eq!(snap.utilization_percent, 99);
        assert_eq!(snap.reason_mask, 0x4);
        assert!((snap.temperature_celsius - 71.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_not_available_fields() {
        let snap = parse_sample_line("[N/A], 300, 0, 0x00000000000000A8, ").unwrap();
        assert_eq!(snap.power_watts, 0.0);
        assert_eq!(snap.reason_mask, 0xA8);
        assert_eq!(snap.temperature_celsius, 0.0);
    }

    #[test]
    fn test_parse_unsupported_placeholders() {
        let snap =
            parse_sample_line("[Not Supported], 1500, 20, 0x0000000000000000, 55").unwrap();
        assert_eq!(snap.power_watts, 0.0);
        assert_eq!(snap.sm_clock_mhz, 1500);
        assert_eq!(snap.utilization_percent, 20);
        assert_eq!(snap.reason_mask, 0);
        assert!((snap.temperature_celsius - 55.0).abs() < 1e-9);

        let snap = parse_sample_line("80.5, 1200, [Unknown Error], 0x4, [Not Supported]").unwrap();
        assert_eq!(snap.utilization_percent, 0);
        assert_eq!(snap.temperature_celsius, 0.0);
        assert_eq!(snap.reason_mask, 0x4);
    }

    #[test]
    fn test_parse_missing_temperature_column() {
        let snap = parse_sample_line("10.0, 210, 3, 0x1").unwrap();
        assert_eq!(snap.reason_mask, 1);
        assert_eq!(snap.temperature_celsius, 0.0);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_sample_line("No devices were found").is_err());
        assert!(parse_sample_line("abc, 1, 2, 0x0, 40").is_err());
        assert!(parse_sample_line("1.0, 1, 2, 0xZZ, 40").is_err());
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let source = SmiSource::with_program("definitely-not-nvidia-smi-binary");
        assert!(matches!(
            source.count(),
            Err(MonitorError::SourceUnavailable(_))
        ));
        assert!(matches!(
            source.sample(0),
            Err(MonitorError::SampleFailed { index: 0, .. })
        ));
    }
}
