//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::{SCAN_DEPTH_DEFAULT, SOURCE_BASE_DEFAULT, paths};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// A named destination directory a route can target.
#[derive(Debug, Clone)]
pub struct DestinationConfig {
    pub name: String,
    pub path: PathBuf,
}

/// Filter specification as written in the config file. Compiled into a
/// routing filter at build time, where bad kinds/patterns surface.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// One of: any, name_contains, name_matches, extension, content_contains.
    pub kind: String,
    pub pattern: Option<String>,
}

/// One route as configured. `condition` stays optional here on purpose:
/// its absence must be a build error naming the route, never a silent
/// default.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub name: String,
    pub destination: String,
    pub dest_dir: PathBuf,
    pub condition: Option<String>,
    pub filter: FilterConfig,
    pub preserve_time: bool,
    pub cleanup_on_error: bool,
}

/// Runtime configuration used by the router.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where candidate files appear
    pub source_base: PathBuf,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// If true, report decisions but do not modify any backend
    pub dry_run: bool,
    /// Maximum depth for the candidate scan
    pub scan_depth: usize,
    /// Named destination directories
    pub destinations: Vec<DestinationConfig>,
    /// Routes dispatching candidates to destinations
    pub routes: Vec<RouteConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_base: PathBuf::from(SOURCE_BASE_DEFAULT),
            log_level: LogLevel::Normal,
            // paths::default_log_path() returns Option<PathBuf>.
            log_file: paths::default_log_path(),
            dry_run: false,
            scan_depth: SCAN_DEPTH_DEFAULT,
            destinations: Vec::new(),
            routes: Vec::new(),
        }
    }
}
