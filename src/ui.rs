use std::collections::BTreeMap;
use std::time::Duration;

use ratatui::text::{Line, Span};

use crate::diagnosis::{compact_code, describe, diagnose, worst_severity};
use crate::history::{HistoryTracker, HISTORY_CAPACITY};
use crate::models::{DeviceIdentity, DeviceSnapshot};
use crate::theme::Palette;

/// Graph width used by the compact layout
pub const COMPACT_GRAPH_WIDTH: usize = 20;

const MAX_RULE_WIDTH: u16 = 120;
const THROTTLED_GLYPH: &str = "█";
const CLEAR_GLYPH: &str = "·";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutMode {
    Normal,
    Compact,
}

/// Compact when the terminal cannot hold header + 4 lines per device
pub fn select_layout(device_count: usize, height: u16) -> LayoutMode {
    let needed = device_count.saturating_mul(4).saturating_add(3);
    if (height as usize) < needed {
        LayoutMode::Compact
    } else {
        LayoutMode::Normal
    }
}

/// Everything one frame is built from
pub struct FrameInput<'a> {
    pub devices: &'a [DeviceIdentity],
    /// Successful samples of this tick. Devices without one are omitted.
    pub snapshots: &'a BTreeMap<u32, DeviceSnapshot>,
    pub history: &'a HistoryTracker,
    pub width: u16,
    pub height: u16,
    pub uptime: Duration,
    pub backend: &'a str,
}

/// Builds the full frame text. Pure: no terminal access.
pub fn build_frame(input: &FrameInput<'_>, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = match select_layout(input.devices.len(), input.height) {
        LayoutMode::Normal => normal_layout(input, palette),
        LayoutMode::Compact => compact_layout(input, palette),
    };

    lines.push(rule(input.width));
    lines.push(Line::from(Span::styled(
        "Press Ctrl+C to exit",
        palette.dim(),
    )));
    lines
}

fn rule(width: u16) -> Line<'static> {
    Line::from("─".repeat(width.min(MAX_RULE_WIDTH) as usize))
}

fn normal_layout(input: &FrameInput<'_>, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("GPU Throttle Monitor", palette.bold()),
            Span::raw(format!(
                " │ Uptime: {:.1}s │ {}",
                input.uptime.as_secs_f64(),
                input.backend
            )),
        ]),
        rule(input.width),
    ];

    for device in input.devices {
        let Some(snap) = input.snapshots.get(&device.index) else {
            continue;
        };

        // Metrics line
        let mut metrics = vec![
            Span::styled(format!("GPU{}", device.index), palette.accent()),
            Span::raw(format!(
                ": {:5.1}W │ {:4}MHz │ {:3}% │ {:3.0}°C",
                snap.power_watts,
                snap.sm_clock_mhz,
                snap.utilization_percent,
                snap.temperature_celsius
            )),
        ];
        if snap.temperature_celsius > 80.0 {
            metrics.push(Span::raw(" "));
            metrics.push(Span::styled("[OVERHEATING]", palette.critical()));
        } else if snap.temperature_celsius > 70.0 {
            metrics.push(Span::raw(" "));
            metrics.push(Span::styled("[HOT]", palette.warning()));
        }
        lines.push(Line::from(metrics));

        let mut graph = vec![Span::raw("  History: ")];
        graph.extend(graph_spans(input.history, device.index, HISTORY_CAPACITY, palette));
        lines.push(Line::from(graph));

        let severity = worst_severity(&diagnose(snap.reason_mask));
        lines.push(Line::from(vec![
            Span::raw("  Status: "),
            Span::styled(describe(snap.reason_mask), palette.severity(severity)),
        ]));

        lines.push(Line::default());
    }

    lines
}

fn compact_layout(input: &FrameInput<'_>, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled("GPU Monitor", palette.bold()),
        Span::raw(format!(" [{:.0}s] ", input.uptime.as_secs_f64())),
        Span::styled("[COMPACT MODE - Terminal too small]", palette.critical()),
    ])];

    for device in input.devices {
        let Some(snap) = input.snapshots.get(&device.index) else {
            continue;
        };

        let mut row = vec![
            Span::styled(format!("GPU{}", device.index), palette.accent()),
            Span::raw(format!(
                ": {:3.0}W {:4}MHz {:2.0}°C ",
                snap.power_watts, snap.sm_clock_mhz, snap.temperature_celsius
            )),
        ];
        row.extend(graph_spans(
            input.history,
            device.index,
            COMPACT_GRAPH_WIDTH,
            palette,
        ));
        if let Some((code, severity)) = compact_code(snap.reason_mask) {
            row.push(Span::raw(" "));
            row.push(Span::styled(code, palette.severity(severity)));
        }
        lines.push(Line::from(row));
    }

    lines
}

fn graph_spans(
    history: &HistoryTracker,
    index: u32,
    width: usize,
    palette: &Palette,
) -> Vec<Span<'static>> {
    history
        .padded(index, width)
        .into_iter()
        .map(|cell| match cell {
            Some(true) => Span::styled(THROTTLED_GLYPH, palette.critical()),
            _ => Span::raw(CLEAR_GLYPH),
        })
        .collect()
}

/// Unstyled text of a line
pub fn line_text(line: &Line<'_>) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}
