//! End-of-run problem analysis with remediation hints.

use std::path::PathBuf;
use std::time::Duration;

use ratatui::text::{Line, Span};

use crate::diagnosis::{diagnose, Finding, Severity};
use crate::models::{DeviceIdentity, DeviceSnapshot};
use crate::theme::Palette;

/// What to tell the operator about one active finding
#[derive(Clone, Debug, PartialEq)]
pub struct Remediation {
    pub headline: &'static str,
    pub severity: Severity,
    pub problem: String,
    pub solution: &'static str,
}

pub fn remediation(finding: Finding, snapshot: &DeviceSnapshot) -> Option<Remediation> {
    let (headline, problem, solution) = match finding {
        Finding::Ok => return None,
        Finding::PowerLimit => (
            "POWER BRAKE ACTIVE",
            "GPU needs more power than available".to_string(),
            "Check PSU capacity, PCIe power cables, or increase power limit",
        ),
        Finding::Overheating => (
            "THERMAL THROTTLING",
            format!(
                "GPU is overheating (currently {:.0}°C)",
                snapshot.temperature_celsius
            ),
            "Improve cooling, check thermal paste, increase fan speed",
        ),
        Finding::Hot => (
            "SOFTWARE THERMAL LIMIT",
            "Driver is limiting performance due to temperature".to_string(),
            "Improve airflow, reduce ambient temperature",
        ),
        Finding::Capped => (
            "POWER CAP",
            "Software power limit is restricting performance".to_string(),
            "Use 'sudo nvidia-smi -pl <watts>' to increase limit",
        ),
        Finding::Throttled => (
            "HARDWARE SLOWDOWN",
            "Hardware slowdown is asserted".to_string(),
            "Check PSU health and any external power-brake signal",
        ),
    };

    Some(Remediation {
        headline,
        severity: finding.severity(),
        problem,
        solution,
    })
}

/// Final state of one device, re-sampled at shutdown
#[derive(Clone, Debug)]
pub struct DeviceReport {
    pub identity: DeviceIdentity,
    pub snapshot: DeviceSnapshot,
}

impl DeviceReport {
    pub fn remediations(&self) -> Vec<Remediation> {
        diagnose(self.snapshot.reason_mask)
            .into_iter()
            .filter_map(|f| remediation(f, &self.snapshot))
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct Summary {
    pub runtime: Duration,
    /// Devices whose final re-sample succeeded
    pub devices: Vec<DeviceReport>,
    pub log_path: Option<PathBuf>,
}

impl Summary {
    pub fn render(&self, palette: &Palette) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::default(),
            Line::from(Span::styled("=== SUMMARY ===", palette.bold())),
            Line::from(format!("Runtime: {:.1} seconds", self.runtime.as_secs_f64())),
            Line::default(),
            Line::from(Span::styled("PROBLEM ANALYSIS:", palette.bold())),
            Line::default(),
        ];

        for device in &self.devices {
            lines.push(Line::from(Span::styled(
                format!("GPU{} [{}]", device.identity.index, device.identity.name),
                palette.accent(),
            )));

            let hints = device.remediations();
            if hints.is_empty() {
                lines.push(Line::from(vec![
                    Span::raw("  "),
                    Span::styled("✓ No problems detected", palette.ok()),
                ]));
                lines.push(Line::default());
                continue;
            }

            for hint in hints {
                let marker = match hint.severity {
                    Severity::Critical => "✗",
                    _ => "⚠",
                };
                lines.push(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(
                        format!("{} {}", marker, hint.headline),
                        palette.severity(hint.severity),
                    ),
                ]));
                lines.push(Line::from(format!("    Problem: {}", hint.problem)));
                lines.push(Line::from(format!("    Solution: {}", hint.solution)));
                lines.push(Line::default());
            }
        }

        if let Some(path) = &self.log_path {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                format!("CSV log saved to: {}", path.display()),
                palette.ok(),
            )));
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::line_text;

    fn report(index: u32, mask: u64, temp: f64) -> DeviceReport {
        DeviceReport {
            identity: DeviceIdentity::new(index, format!("RTX {index}")),
            snapshot: DeviceSnapshot {
                power_watts: 300.0,
                sm_clock_mhz: 1800,
                utilization_percent: 100,
                reason_mask: mask,
                temperature_celsius: temp,
            },
        }
    }

    fn text(summary: &Summary) -> Vec<String> {
        summary
            .render(&Palette::plain())
            .iter()
            .map(line_text)
            .collect()
    }

    #[test]
    fn test_hints_follow_report_order() {
        let headlines: Vec<&str> = report(0, 0x00E4, 88.0)
            .remediations()
            .iter()
            .map(|r| r.headline)
            .collect();
        assert_eq!(
            headlines,
            vec![
                "POWER BRAKE ACTIVE",
                "THERMAL THROTTLING",
                "SOFTWARE THERMAL LIMIT",
                "POWER CAP"
            ]
        );
    }

    #[test]
    fn test_overheating_mentions_temperature() {
        let hints = report(0, 0x0040, 91.4).remediations();
        assert_eq!(hints[0].problem, "GPU is overheating (currently 91°C)");
        assert_eq!(hints[0].severity, Severity::Critical);
    }

    #[test]
    fn test_render_clean_and_problem_devices() {
        let summary = Summary {
            runtime: Duration::from_millis(61_340),
            devices: vec![report(0, 0, 40.0), report(1, 0x0004, 60.0)],
            log_path: Some(PathBuf::from("/tmp/run.csv")),
        };
        let lines = text(&summary);
        assert!(lines.contains(&"=== SUMMARY ===".to_string()));
        assert!(lines.contains(&"Runtime: 61.3 seconds".to_string()));

        let gpu0 = lines.iter().position(|l| l == "GPU0 [RTX 0]").unwrap();
        assert_eq!(lines[gpu0 + 1], "  ✓ No problems detected");

        let gpu1 = lines.iter().position(|l| l == "GPU1 [RTX 1]").unwrap();
        assert_eq!(lines[gpu1 + 1], "  ⚠ POWER CAP");
        assert!(lines[gpu1 + 3].contains("nvidia-smi -pl"));
        assert_eq!(lines.last().unwrap(), "CSV log saved to: /tmp/run.csv");
    }

    #[test]
    fn test_slowdown_alone_is_not_reported_clean() {
        let summary = Summary {
            runtime: Duration::ZERO,
            devices: vec![report(3, 0x0008, 50.0)],
            log_path: None,
        };
        let lines = text(&summary);
        assert!(!lines.iter().any(|l| l.contains("No problems detected")));
        assert!(lines.iter().any(|l| l == "  ⚠ HARDWARE SLOWDOWN"));
    }
}
