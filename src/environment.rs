//! Environment propagation.
//!
//! Exporting a profile happens in two steps:
//! 1. The current process gets `ANTHROPIC_BASE_URL` / `ANTHROPIC_AUTH_TOKEN`.
//! 2. The same variables are persisted for future shells: `setx` on Windows,
//!    an appended export block in `~/.bashrc` / `~/.zshrc` elsewhere.
//!
//! Step 1 is all-or-nothing. Step 2 is best-effort: every target gets its own
//! `PersistOutcome` and a failing target never aborts the others.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::EnvError;
use crate::fs_utils::append_to_existing;
use crate::store::Profile;

pub const BASE_URL_VAR: &str = "ANTHROPIC_BASE_URL";
pub const AUTH_TOKEN_VAR: &str = "ANTHROPIC_AUTH_TOKEN";

/// Interactive shell startup files, relative to the home directory
pub const STARTUP_FILE_NAMES: [&str; 2] = [".bashrc", ".zshrc"];

/// First line of every block appended to a startup file
pub const BLOCK_MARKER: &str = "# CHCC API Configuration";

/// How persistent user-scope variables are written on this OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
    Unsupported(String),
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value to a platform
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "linux" | "macos" | "freebsd" | "netbsd" | "openbsd" | "dragonfly" | "solaris"
            | "illumos" | "android" => Self::Unix,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Shell whose syntax users of this platform most likely need
    pub fn default_shell(&self) -> Shell {
        match self {
            Self::Windows => Shell::PowerShell,
            _ => Shell::Posix,
        }
    }

    /// Shells to print manual export commands for
    pub fn manual_shells(&self) -> &'static [Shell] {
        match self {
            Self::Windows => &[Shell::Cmd, Shell::PowerShell],
            Self::Unix => &[Shell::Posix],
            Self::Unsupported(_) => &[Shell::Posix, Shell::Cmd, Shell::PowerShell],
        }
    }
}

/// Shell flavours we can print manual export commands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    /// bash, zsh and other POSIX shells
    Posix,
    /// Windows Command Prompt
    Cmd,
    PowerShell,
}

impl std::str::FromStr for Shell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "posix" | "sh" | "bash" | "zsh" => Ok(Self::Posix),
            "cmd" => Ok(Self::Cmd),
            "powershell" | "pwsh" => Ok(Self::PowerShell),
            _ => Err(format!("invalid shell: {} (expected posix, cmd or powershell)", s)),
        }
    }
}

impl Shell {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Posix => "Bash/Zsh",
            Self::Cmd => "Command Prompt (cmd.exe)",
            Self::PowerShell => "PowerShell",
        }
    }

    /// Commands that set both variables for `profile` in this shell
    pub fn export_commands(&self, profile: &Profile) -> Vec<String> {
        profile_vars(profile)
            .iter()
            .map(|(var, value)| match self {
                Self::Posix => format!("export {}={}", var, posix_quote(value)),
                Self::Cmd => format!("set {}={}", var, cmd_escape(value)),
                Self::PowerShell => format!("$env:{}='{}'", var, value.replace('\'', "''")),
            })
            .collect()
    }
}

/// What happened to one persistence target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Export block appended to a startup file
    Appended(PathBuf),
    /// Startup file exists but could not be written
    AppendFailed { path: PathBuf, reason: String },
    /// Variable stored at user scope with setx
    Stored(&'static str),
    /// setx could not store the variable
    StoreFailed { var: &'static str, reason: String },
}

impl PersistOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::AppendFailed { .. } | Self::StoreFailed { .. })
    }
}

/// Per-target results of a successful propagation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub outcomes: Vec<PersistOutcome>,
}

impl PropagationReport {
    pub fn failures(&self) -> impl Iterator<Item = &PersistOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    /// True if at least one target now carries the variables
    pub fn persisted_anywhere(&self) -> bool {
        self.outcomes.iter().any(|o| !o.is_failure())
    }
}

/// Writes a profile's credentials into the process and user environment
#[derive(Debug, Clone)]
pub struct Propagator {
    platform: Platform,
    home: Option<PathBuf>,
    setx_program: PathBuf,
}

impl Propagator {
    pub fn new(platform: Platform, home: Option<PathBuf>) -> Self {
        Self {
            platform,
            home,
            setx_program: PathBuf::from("setx"),
        }
    }

    /// Propagator for the running OS, writing under `home` when known
    pub fn for_current_platform(home: Option<PathBuf>) -> Self {
        Self::new(Platform::current(), home)
    }

    /// Use a different program in place of `setx`
    pub fn with_setx_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.setx_program = program.into();
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Candidate startup files, whether or not they exist
    pub fn startup_files(&self) -> Result<Vec<PathBuf>, EnvError> {
        let home = self.home.as_deref().ok_or(EnvError::HomeDirUnavailable)?;
        Ok(STARTUP_FILE_NAMES.iter().map(|n| home.join(n)).collect())
    }

    /// Export `profile` into the current process and persist it for new shells
    ///
    /// Mutates the environment of the whole process.
    pub fn set_for_profile(&self, profile: &Profile) -> Result<PropagationReport, EnvError> {
        self.export_to_process(profile)?;
        self.persist(profile)
    }

    /// Step 1: set both variables in this process
    ///
    /// Call this before starting any thread (spinners included): nothing
    /// else may be reading the environment while it changes.
    pub fn export_to_process(&self, profile: &Profile) -> Result<(), EnvError> {
        if let Platform::Unsupported(os) = &self.platform {
            return Err(EnvError::UnsupportedPlatform(os.clone()));
        }
        set_process_vars(&profile_vars(profile))
    }

    /// Step 2: persist both variables for future shells, best-effort
    pub fn persist(&self, profile: &Profile) -> Result<PropagationReport, EnvError> {
        let vars = profile_vars(profile);

        let outcomes = match &self.platform {
            Platform::Unsupported(os) => return Err(EnvError::UnsupportedPlatform(os.clone())),
            Platform::Windows => self.store_with_setx(&vars),
            Platform::Unix => self.append_to_startup_files(profile)?,
        };

        Ok(PropagationReport { outcomes })
    }

    fn store_with_setx(&self, vars: &[(&'static str, &str); 2]) -> Vec<PersistOutcome> {
        vars.iter()
            .map(|&(var, value)| {
                match Command::new(&self.setx_program).arg(var).arg(value).output() {
                    Ok(output) if output.status.success() => PersistOutcome::Stored(var),
                    Ok(output) => PersistOutcome::StoreFailed {
                        var,
                        reason: format!("setx exited with {}", output.status),
                    },
                    Err(e) => PersistOutcome::StoreFailed {
                        var,
                        reason: e.to_string(),
                    },
                }
            })
            .collect()
    }

    fn append_to_startup_files(&self, profile: &Profile) -> Result<Vec<PersistOutcome>, EnvError> {
        let block = export_block(profile);
        let mut outcomes = Vec::new();

        for path in self.startup_files()? {
            if !path.exists() {
                continue;
            }
            match append_to_existing(&path, &block) {
                Ok(()) => outcomes.push(PersistOutcome::Appended(path)),
                Err(e) => outcomes.push(PersistOutcome::AppendFailed {
                    path,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(outcomes)
    }
}

/// The block appended to shell startup files
pub fn export_block(profile: &Profile) -> String {
    let exports = Shell::Posix.export_commands(profile);
    format!("\n{}\n{}\n", BLOCK_MARKER, exports.join("\n"))
}

/// Number of chcc export blocks in a startup file's contents
pub fn count_blocks(content: &str) -> usize {
    content.lines().filter(|l| l.trim() == BLOCK_MARKER).count()
}

/// Number of chcc export blocks in the file at `path` (0 if unreadable)
pub fn count_blocks_in(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|c| count_blocks(&c))
        .unwrap_or(0)
}

fn profile_vars(profile: &Profile) -> [(&'static str, &str); 2] {
    [
        (BASE_URL_VAR, profile.base_url.as_str()),
        (AUTH_TOKEN_VAR, profile.token.as_str()),
    ]
}

fn set_process_vars(vars: &[(&'static str, &str); 2]) -> Result<(), EnvError> {
    // Validate everything first so a bad value leaves the environment untouched
    if let Some(&(var, _)) = vars.iter().find(|(_, value)| value.contains('\0')) {
        return Err(EnvError::InvalidValue { var });
    }

    for (var, value) in vars {
        // SAFETY: only reached through `export_to_process`, which runs before
        // chcc starts any other thread.
        unsafe { std::env::set_var(var, value) };
    }
    Ok(())
}

/// Double-quote `value` for POSIX shells
fn posix_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Caret-escape cmd.exe metacharacters for an unquoted `set` line
///
/// Quoting is not an option: inside `set "VAR=..."` a caret would be kept
/// literally, while `%` is still expanded.
fn cmd_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '^' | '&' | '|' | '<' | '>' | '%') {
            escaped.push('^');
        }
        escaped.push(c);
    }
    escaped
}
