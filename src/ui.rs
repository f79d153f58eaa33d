//! Terminal output for chcc.
//!
//! Every message goes through `Ui` so colour handling lives in one place.
//! Colour is off when any of these hold, checked in this order:
//! 1. `--no-color` was passed
//! 2. `NO_COLOR` is set (any value)
//! 3. `TERM=dumb`
//! 4. `--color auto` and stdout is not a terminal
//!
//! Without colour the status icons fall back to ASCII and spinners are hidden,
//! so piped output (`eval "$(chcc env)"`) stays clean.

use anstream::{eprintln, println};
use anstyle::{AnsiColor, Color, Style};
use clap::ValueEnum;
use comfy_table::{Attribute, Cell, ContentArrangement, Table, presets};
use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;
use std::io::IsTerminal;
use std::time::Duration;

const SPINNER_FRAMES: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const SPINNER_TICK: Duration = Duration::from_millis(80);

/// Value of `--color`
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Always,
    #[default]
    Auto,
    Never,
}

/// Severity of a labelled line
#[derive(Debug, Clone, Copy)]
enum Level {
    Ok,
    Warn,
    Error,
    Info,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Info => "INFO",
        }
    }

    fn color(self) -> AnsiColor {
        match self {
            Self::Ok => AnsiColor::Green,
            Self::Warn => AnsiColor::Yellow,
            Self::Error => AnsiColor::Red,
            Self::Info => AnsiColor::Cyan,
        }
    }
}

/// Resolved display settings
#[derive(Debug, Clone)]
pub struct Ui {
    pub color_enabled: bool,
    /// Animated spinners need both colour and a terminal
    pub spinner_enabled: bool,
}

impl Ui {
    pub fn new(mode: ColorMode, force_no_color: bool) -> Self {
        let color_enabled = Self::resolve_color(mode, force_no_color);
        if !color_enabled {
            anstream::ColorChoice::write_global(anstream::ColorChoice::Never);
        }

        Self {
            color_enabled,
            spinner_enabled: color_enabled && std::io::stdout().is_terminal(),
        }
    }

    fn resolve_color(mode: ColorMode, force_no_color: bool) -> bool {
        let no_color_env = std::env::var_os("NO_COLOR").is_some();
        let dumb_term = std::env::var("TERM").is_ok_and(|t| t == "dumb");
        if force_no_color || no_color_env || dumb_term {
            return false;
        }

        match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color_enabled {
            format!("{style}{text}{style:#}")
        } else {
            text.to_string()
        }
    }

    fn label(&self, level: Level) -> String {
        let style = Style::new()
            .fg_color(Some(Color::Ansi(level.color())))
            .bold();
        self.paint(level.tag(), style)
    }

    /// Errors go to stderr, everything else to stdout
    fn emit(&self, level: Level, msg: &str) {
        let label = self.label(level);
        match level {
            Level::Error => eprintln!("{} {}", label, msg),
            _ => println!("{} {}", label, msg),
        }
    }

    pub fn ok(&self, msg: impl AsRef<str>) {
        self.emit(Level::Ok, msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.emit(Level::Warn, msg.as_ref());
    }

    pub fn err(&self, msg: impl AsRef<str>) {
        self.emit(Level::Error, msg.as_ref());
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.emit(Level::Info, msg.as_ref());
    }

    pub fn dim(&self, s: impl AsRef<str>) -> String {
        self.colored(s, AnsiColor::BrightBlack)
    }

    pub fn bold(&self, s: impl AsRef<str>) -> String {
        self.paint(s.as_ref(), Style::new().bold())
    }

    pub fn colored(&self, s: impl AsRef<str>, color: AnsiColor) -> String {
        self.paint(s.as_ref(), Style::new().fg_color(Some(Color::Ansi(color))))
    }

    fn icon(&self, fancy: &'static str, plain: &'static str) -> &'static str {
        if self.color_enabled { fancy } else { plain }
    }

    pub fn icon_ok(&self) -> &'static str {
        self.icon("✓", "[OK]")
    }

    pub fn icon_warn(&self) -> &'static str {
        self.icon("⚠", "[!]")
    }

    pub fn icon_err(&self) -> &'static str {
        self.icon("✗", "[X]")
    }

    pub fn icon_info(&self) -> &'static str {
        self.icon("•", "-")
    }

    /// Borderless table that wraps to the terminal width
    pub fn simple_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }

    pub fn cell(&self, content: impl Into<String>) -> Cell {
        Cell::new(content.into())
    }

    pub fn header_cell(&self, content: impl Into<String>) -> Cell {
        let cell = self.cell(content);
        if self.color_enabled {
            cell.add_attribute(Attribute::Bold)
        } else {
            cell
        }
    }

    /// Coloured through comfy-table itself, so column widths ignore escapes
    pub fn colored_cell(&self, content: impl Into<String>, color: AnsiColor) -> Cell {
        let cell = self.cell(content);
        if self.color_enabled {
            cell.fg(comfy_color(color))
        } else {
            cell
        }
    }

    /// Spinner for slow work; hidden when spinners are disabled
    pub fn spinner(&self, message: impl Into<Cow<'static, str>>) -> ProgressBar {
        if !self.spinner_enabled {
            let pb = ProgressBar::hidden();
            pb.set_message(message);
            return pb;
        }

        let style = ProgressStyle::default_spinner()
            .tick_chars(SPINNER_FRAMES)
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let pb = ProgressBar::new_spinner().with_style(style);
        pb.set_message(message);
        pb.enable_steady_tick(SPINNER_TICK);
        pb
    }

    pub fn spinner_finish_ok(&self, pb: &ProgressBar, msg: impl Into<Cow<'static, str>>) {
        self.finish_spinner(pb, Level::Ok, msg.into());
    }

    pub fn spinner_finish_err(&self, pb: &ProgressBar, msg: impl Into<Cow<'static, str>>) {
        self.finish_spinner(pb, Level::Error, msg.into());
    }

    /// A hidden spinner leaves nothing behind, so the result becomes a label line
    fn finish_spinner(&self, pb: &ProgressBar, level: Level, msg: Cow<'static, str>) {
        if !self.spinner_enabled {
            pb.finish_and_clear();
            self.emit(level, &msg);
            return;
        }

        let icon = match level {
            Level::Ok => self.icon_ok(),
            Level::Warn => self.icon_warn(),
            Level::Error => self.icon_err(),
            Level::Info => self.icon_info(),
        };
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg}") {
            pb.set_style(style);
        }
        pb.finish_with_message(format!("{} {}", self.colored(icon, level.color()), msg));
    }

    pub fn println(&self, msg: impl AsRef<str>) {
        println!("{}", msg.as_ref());
    }

    pub fn newline(&self) {
        println!();
    }

    pub fn section(&self, title: impl AsRef<str>) {
        println!("{}", self.bold(title));
    }
}

/// comfy-table has no bright variants apart from dark grey
fn comfy_color(color: AnsiColor) -> comfy_table::Color {
    use comfy_table::Color as C;

    if color == AnsiColor::BrightBlack {
        return C::DarkGrey;
    }
    match color.bright(false) {
        AnsiColor::Black => C::Black,
        AnsiColor::Red => C::Red,
        AnsiColor::Green => C::Green,
        AnsiColor::Yellow => C::Yellow,
        AnsiColor::Blue => C::Blue,
        AnsiColor::Magenta => C::Magenta,
        AnsiColor::Cyan => C::Cyan,
        _ => C::White,
    }
}
