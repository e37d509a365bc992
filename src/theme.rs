use ratatui::style::{Color, Modifier, Style};

use crate::diagnosis::Severity;

pub const CRITICAL_RED: Color = Color::Red;
pub const WARNING_YELLOW: Color = Color::Yellow;
pub const OK_GREEN: Color = Color::Green;
pub const ACCENT_CYAN: Color = Color::Cyan;

/// Styles for the dashboard and summary. With color disabled every style is
/// the default, so no SGR codes are emitted.
#[derive(Clone, Copy, Debug)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    /// Color only on an interactive terminal whose `TERM` supports it
    pub fn detect() -> Self {
        use std::io::IsTerminal;

        let term = std::env::var("TERM").unwrap_or_default();
        Self::new(std::io::stdout().is_terminal() && !term.is_empty() && term != "dumb")
    }

    pub fn is_color(&self) -> bool {
        self.color
    }

    fn fg(&self, color: Color) -> Style {
        if self.color {
            Style::default().fg(color)
        } else {
            Style::default()
        }
    }

    pub fn critical(&self) -> Style {
        self.fg(CRITICAL_RED)
    }

    pub fn warning(&self) -> Style {
        self.fg(WARNING_YELLOW)
    }

    pub fn ok(&self) -> Style {
        self.fg(OK_GREEN)
    }

    pub fn accent(&self) -> Style {
        self.fg(ACCENT_CYAN)
    }

    pub fn severity(&self, severity: Severity) -> Style {
        match severity {
            Severity::Critical => self.critical(),
            Severity::Warning => self.warning(),
            Severity::Ok => self.ok(),
        }
    }

    pub fn bold(&self) -> Style {
        if self.color {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    }

    pub fn dim(&self) -> Style {
        if self.color {
            Style::default().add_modifier(Modifier::DIM)
        } else {
            Style::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_palette_has_no_styles() {
        let p = Palette::plain();
        assert_eq!(p.critical(), Style::default());
        assert_eq!(p.bold(), Style::default());
        assert_eq!(p.severity(Severity::Ok), Style::default());
    }

    #[test]
    fn test_severity_colors() {
        let p = Palette::new(true);
        assert_eq!(p.severity(Severity::Critical).fg, Some(CRITICAL_RED));
        assert_eq!(p.severity(Severity::Warning).fg, Some(WARNING_YELLOW));
        assert_eq!(p.severity(Severity::Ok).fg, Some(OK_GREEN));
    }
}
