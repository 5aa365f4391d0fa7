//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - Positional FILE arguments route specific files; with none given the
//!   source base is scanned for candidates.
//! - --debug is a shorthand for --log-level debug.

use clap::{Parser, ValueHint};
use std::path::PathBuf;

use crate::config::{Config, LogLevel};

/// CLI wrapper for the shunt library.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Route files through filters and move them safely between storage roots"
)]
pub struct Args {
    /// Specific files to route, relative to the source base (or absolute
    /// paths underneath it). When empty, the source base is scanned.
    #[arg(value_name = "FILE", value_hint = ValueHint::AnyPath)]
    pub files: Vec<PathBuf>,

    /// Explicit config file (overrides SHUNT_CONFIG and the default location).
    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        help = "Path to the XML config file"
    )]
    pub config: Option<PathBuf>,

    /// Override the source base directory (normally configured via XML).
    #[arg(long, value_hint = ValueHint::DirPath, help = "Override the source base directory")]
    pub source_base: Option<PathBuf>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Print where shunt will look for the config file (or SHUNT_CONFIG if set), then exit.
    #[arg(long, help = "Print the config file location used by shunt and exit")]
    pub print_config: bool,

    /// Print the configured routes with their filters and conditions, then exit.
    #[arg(long, help = "Print the route table and exit")]
    pub list_routes: bool,

    /// Dry-run: log routing decisions but do not modify any backend.
    #[arg(
        long,
        help = "Show what would be done, but do not modify files/directories"
    )]
    pub dry_run: bool,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, help = "Emit logs in structured JSON")]
    pub json: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(sb) = &self.source_base {
            cfg.source_base = sb.clone();
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if self.dry_run {
            cfg.dry_run = true;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
