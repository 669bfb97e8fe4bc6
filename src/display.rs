//! Terminal rendering of monitor events.
use std::{collections::HashMap, io::Write};

use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

use crate::{
    classify::{ServerRole, Severity},
    config::ColorConfig,
    error::MonitorError,
    metrics::MetricsSnapshot,
    supervisor::{DisplayLine, MonitorEvent, ProcessResult},
};

/// Colors used for severity tags.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: HashMap<Severity, Color>,
}

impl Default for Palette {
    fn default() -> Self {
        let colors = [
            (Severity::Status, Color::Green),
            (Severity::Info, Color::Cyan),
            (Severity::Notice, Color::White),
            (Severity::Warning, Color::Yellow),
            (Severity::Error, Color::Red),
            (Severity::Sql, Color::Magenta),
            (Severity::Debug, Color::DarkCyan),
            (Severity::Other, Color::Grey),
        ]
        .into_iter()
        .collect();
        Self { colors }
    }
}

impl Palette {
    /// Builds a palette from configured preferences, keeping defaults for the rest.
    pub fn from_config(config: &ColorConfig) -> Result<Self, MonitorError> {
        let mut palette = Self::default();
        let configured = [
            (Severity::Status, &config.status),
            (Severity::Info, &config.info),
            (Severity::Notice, &config.notice),
            (Severity::Warning, &config.warning),
            (Severity::Error, &config.error),
            (Severity::Sql, &config.sql),
            (Severity::Debug, &config.debug),
            (Severity::Other, &config.other),
        ];

        for (severity, value) in configured {
            if let Some(value) = value {
                let color = parse_color(value).ok_or_else(|| MonitorError::InvalidColor {
                    severity,
                    value: value.clone(),
                })?;
                palette.colors.insert(severity, color);
            }
        }

        Ok(palette)
    }

    pub fn color(&self, severity: Severity) -> Color {
        self.colors.get(&severity).copied().unwrap_or(Color::Reset)
    }
}

/// Parses a color name (`red`, `dark_yellow`) or a `#rrggbb` hex value.
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        return Some(Color::Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        });
    }

    let color = match value.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
        "black" => Color::Black,
        "dark_grey" | "dark_gray" => Color::DarkGrey,
        "red" => Color::Red,
        "dark_red" => Color::DarkRed,
        "green" => Color::Green,
        "dark_green" => Color::DarkGreen,
        "yellow" => Color::Yellow,
        "dark_yellow" => Color::DarkYellow,
        "blue" => Color::Blue,
        "dark_blue" => Color::DarkBlue,
        "magenta" => Color::Magenta,
        "dark_magenta" => Color::DarkMagenta,
        "cyan" => Color::Cyan,
        "dark_cyan" => Color::DarkCyan,
        "white" => Color::White,
        "grey" | "gray" => Color::Grey,
        _ => return None,
    };
    Some(color)
}

/// Writes monitor events as colored console lines.
pub struct ConsoleRenderer<W: Write> {
    out: W,
    palette: Palette,
    color: bool,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W, palette: Palette, color: bool) -> Self {
        Self {
            out,
            palette,
            color,
        }
    }

    /// Writes one event and flushes.
    pub fn render(&mut self, event: &MonitorEvent) -> std::io::Result<()> {
        match event {
            MonitorEvent::Line(line) => self.render_line(line),
            MonitorEvent::Online(count) => {
                writeln!(self.out, "{:<6} Online players: {count}", role_prefix(ServerRole::Login))
            }
            MonitorEvent::Stopped { role, exit_code } => {
                let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                writeln!(
                    self.out,
                    "{:<6} >>{} - stopped<< (exit: {code})",
                    role_prefix(*role),
                    role.label()
                )
            }
        }?;
        self.out.flush()
    }

    fn render_line(&mut self, line: &DisplayLine) -> std::io::Result<()> {
        write!(
            self.out,
            "{:<6} {} {}",
            role_prefix(line.role),
            line.received_at.format("%H:%M:%S"),
            line.leading
        )?;

        if !line.tag.is_empty() {
            if self.color {
                queue!(
                    self.out,
                    SetForegroundColor(self.palette.color(line.severity)),
                    Print(line.tag),
                    ResetColor
                )?;
            } else {
                write!(self.out, "{}", line.tag)?;
            }
        }

        writeln!(self.out, "{}", line.text)
    }

    /// Prints the aggregate counters.
    pub fn render_summary(&mut self, snapshot: &MetricsSnapshot) -> std::io::Result<()> {
        writeln!(self.out, "Errors: {} total", snapshot.total_errors)?;
        for role in ServerRole::ALL {
            writeln!(self.out, "  {:<6} {}", role.as_ref(), snapshot.errors(role))?;
        }
        writeln!(self.out, "Warnings: {}", snapshot.warnings)?;
        writeln!(self.out, "SQL: {}", snapshot.sql)?;
        writeln!(self.out, "Debug: {}", snapshot.debug)?;
        writeln!(self.out, "Online: {}", snapshot.online)?;
        self.out.flush()
    }

    /// Prints the result of a supervised run.
    pub fn render_result(&mut self, result: &ProcessResult) -> std::io::Result<()> {
        match result.exit_code {
            Some(code) => writeln!(self.out, "Process exited with code {code}")?,
            None => writeln!(self.out, "Process was terminated by a signal")?,
        }
        if !result.output.is_empty() {
            writeln!(self.out, "--- output ---")?;
            write!(self.out, "{}", result.output)?;
        }
        self.out.flush()
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

fn role_prefix(role: ServerRole) -> String {
    format!("[{role}]")
}
