use std::io::{self, Stdout, Write};

use crossterm::style::{Attribute, Color as AnsiColor, ContentStyle, StyledContent};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::{
    backend::CrosstermBackend,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::Paragraph,
    Terminal,
};

use crate::theme::Palette;
use crate::ui::line_text;

/// Size used when the terminal cannot be queried
pub const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Where frames end up. `size` is called every tick and must not cache.
pub trait Screen {
    /// `(width, height)` in cells
    fn size(&self) -> (u16, u16);

    /// Replaces whatever is on screen with `lines`
    fn present(&mut self, lines: Vec<Line<'static>>) -> io::Result<()>;

    /// Gives the terminal back to the shell. Safe to call twice.
    fn restore(&mut self) -> io::Result<()>;
}

/// Full-screen dashboard on the alternate screen
pub struct TerminalScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl TerminalScreen {
    pub fn enter() -> io::Result<Self> {
        let terminal = in_alternate_screen(&mut io::stdout(), || {
            let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
            terminal.hide_cursor()?;
            Ok(terminal)
        })?;
        Ok(Self {
            terminal,
            active: true,
        })
    }
}

/// Switches `out` to the alternate screen and runs `setup`. The switch is
/// undone if `setup` fails.
fn in_alternate_screen<W, T>(out: &mut W, setup: impl FnOnce() -> io::Result<T>) -> io::Result<T>
where
    W: Write,
{
    crossterm::execute!(out, EnterAlternateScreen)?;
    setup().inspect_err(|_| {
        let _ = crossterm::execute!(out, LeaveAlternateScreen);
    })
}

impl Screen for TerminalScreen {
    fn size(&self) -> (u16, u16) {
        crossterm::terminal::size().unwrap_or(FALLBACK_SIZE)
    }

    fn present(&mut self, lines: Vec<Line<'static>>) -> io::Result<()> {
        // Clear resets the previous buffer so the draw repaints every cell
        self.terminal.clear()?;
        self.terminal.draw(|frame| {
            frame.render_widget(Paragraph::new(lines), frame.area());
        })?;
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.terminal.show_cursor()?;
        crossterm::execute!(io::stdout(), LeaveAlternateScreen)?;
        Ok(())
    }
}

impl Drop for TerminalScreen {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Frames written one after another as plain text, for pipes and dumb terminals
pub struct PlainScreen<W: Write> {
    out: W,
}

impl<W: Write> PlainScreen<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Screen for PlainScreen<W> {
    fn size(&self) -> (u16, u16) {
        crossterm::terminal::size().unwrap_or(FALLBACK_SIZE)
    }

    fn present(&mut self, lines: Vec<Line<'static>>) -> io::Result<()> {
        write_lines(&mut self.out, &lines, &Palette::plain())?;
        writeln!(self.out)?;
        self.out.flush()
    }

    fn restore(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Writes styled lines outside the TUI, as SGR sequences when the palette
/// allows color
pub fn write_lines<W: Write>(out: &mut W, lines: &[Line<'_>], palette: &Palette) -> io::Result<()> {
    for line in lines {
        if palette.is_color() {
            for span in &line.spans {
                let style = to_ansi_style(span.style);
                write!(out, "{}", StyledContent::new(style, span.content.as_ref()))?;
            }
            writeln!(out)?;
        } else {
            writeln!(out, "{}", line_text(line))?;
        }
    }
    Ok(())
}

fn to_ansi_style(style: Style) -> ContentStyle {
    let mut out = ContentStyle::new();
    out.foreground_color = style.fg.and_then(ansi_color);
    if style.add_modifier.contains(Modifier::BOLD) {
        out.attributes.set(Attribute::Bold);
    }
    if style.add_modifier.contains(Modifier::DIM) {
        out.attributes.set(Attribute::Dim);
    }
    out
}

fn ansi_color(color: Color) -> Option<AnsiColor> {
    match color {
        Color::Red => Some(AnsiColor::DarkRed),
        Color::Yellow => Some(AnsiColor::DarkYellow),
        Color::Green => Some(AnsiColor::DarkGreen),
        Color::Cyan => Some(AnsiColor::DarkCyan),
        _ => None,
    }
}
