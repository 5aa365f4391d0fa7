//! Application orchestrator.
//! Loads/merges config, initializes logging, installs signal handlers,
//! builds the route table, collects candidates, and drives the mover.

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::cli::Args;
use crate::config::{self, Config, build_route_table, xml};
use crate::errors::TransferError;
use crate::logging::init_tracing;
use crate::output as out;
use crate::routing::{Candidate, RouteError, RouteTable};
use crate::shutdown;
use crate::storage::StorageHandle;
use crate::transfer::{Mover, TransferOutcome};

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    // Handle --print-config before logging init
    if args.print_config {
        if let Some(p) = args.config.as_deref() {
            out::print_info(&format!("Using --config (explicit):\n  {}\n", p.display()));
            return Ok(());
        }
        if let Ok(cfg_env) = std::env::var(xml::CONFIG_ENV) {
            out::print_info(&format!("Using SHUNT_CONFIG (explicit):\n  {}\n", cfg_env));
            out::print_info("To override, unset SHUNT_CONFIG or set it to another file.");
            return Ok(());
        }
        match config::default_config_path() {
            Some(p) => {
                out::print_info(&format!("Default shunt config path:\n  {}\n", p.display()));
                if p.exists() {
                    out::print_info("A config file already exists at that location.");
                } else {
                    out::print_info(
                        "No config file exists there yet. Run without --print-config to create a template.",
                    );
                }
            }
            None => {
                out::print_error("Could not determine a default config path.");
            }
        }
        return Ok(());
    }

    // Build config (may read XML). CLI args override config values.
    let mut cfg = match xml::load_config(args.config.as_deref())? {
        Some(cfg) => cfg,
        None => {
            // A template was just written at the default location (or no
            // default location exists). Point the user at it and stop.
            if let Some(p) = config::default_config_path() {
                out::print_success(&format!(
                    "A template shunt config was written to: {}",
                    p.display()
                ));
                out::print_info(
                    "Edit the file to set `source_base`, `destinations` and `routes`, then re-run. To use a different location set SHUNT_CONFIG or pass --config.",
                );
            } else {
                out::print_error("No config file and no default config location available.");
            }
            return Ok(());
        }
    };
    args.apply_overrides(&mut cfg);

    // Initialize logging and capture the guard so we can drop it on signal
    let guard_opt: Option<tracing_appender::non_blocking::WorkerGuard> =
        init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
            out::print_error(&format!("Failed to initialize logging: {}", e));
            e
        })?;

    // Guard needs to be dropped on SIGINT to flush logs
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; shutting down gracefully...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take(); // drop guard here to flush tracing_appender
            }
        })
        .context("failed to install signal handler")?;
    }

    if shutdown::is_requested() {
        return Ok(());
    }

    debug!("Starting shunt: {:?}", args);

    let result = run_inner(&args, &cfg);

    // Ensure logs are flushed before exit
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }

    result
}

fn run_inner(args: &Args, cfg: &Config) -> Result<()> {
    let (source, table) = build_route_table(cfg)?;

    if args.list_routes {
        print_routes(&table);
        return Ok(());
    }

    if table.routes().is_empty() {
        bail!(
            "no routes configured; add <route> entries to the config file (see --print-config)"
        );
    }

    let candidates = collect_candidates(args, cfg, &source, &table)?;
    if candidates.is_empty() {
        out::print_info("No candidate files found; nothing to do.");
        return Ok(());
    }
    info!(count = candidates.len(), "routing candidates");

    let mover = Mover::new();
    let tallies: Vec<FileResult> = candidates
        .par_iter()
        .map(|candidate| route_one(candidate, cfg, &source, &table, &mover))
        .collect();

    let moved = tallies.iter().filter(|r| matches!(r, FileResult::Moved)).count();
    let skipped = tallies.iter().filter(|r| matches!(r, FileResult::Skipped)).count();
    let unrouted = tallies.iter().filter(|r| matches!(r, FileResult::NoRoute)).count();
    let interrupted = tallies.iter().filter(|r| matches!(r, FileResult::Interrupted)).count();
    let failed = tallies.iter().filter(|r| matches!(r, FileResult::Failed)).count();

    info!(moved, skipped, unrouted, interrupted, failed, "run complete");
    if cfg.dry_run {
        out::print_info(&format!(
            "Dry-run: {} would move, {} would skip, {} without a route",
            moved, skipped, unrouted
        ));
    } else {
        out::print_user(&format!(
            "moved {} file(s), skipped {}, {} without a route",
            moved, skipped, unrouted
        ));
    }
    if interrupted > 0 {
        out::print_warn(&format!("{} file(s) not processed due to interrupt", interrupted));
    }
    if failed > 0 {
        bail!("{failed} of {} file(s) failed; see log for details", tallies.len());
    }
    Ok(())
}

enum FileResult {
    Moved,
    Skipped,
    NoRoute,
    Interrupted,
    Failed,
}

/// Route a single candidate: dispatch, then move (or report, on dry-run).
fn route_one(
    candidate: &Candidate,
    cfg: &Config,
    source: &StorageHandle,
    table: &RouteTable,
    mover: &Mover,
) -> FileResult {
    if shutdown::is_requested() {
        return FileResult::Interrupted;
    }

    let route = match table.dispatch(candidate) {
        Ok(Some(route)) => route,
        Ok(None) => {
            debug!(file = %candidate.path().display(), "no route matches");
            return FileResult::NoRoute;
        }
        Err(RouteError::MultipleRoutes { path, names }) => {
            error!(file = %path.display(), routes = ?names, "multiple routes match; refusing to pick");
            return FileResult::Failed;
        }
        Err(e) => {
            error!(file = %candidate.path().display(), error = %e, "dispatch failed");
            return FileResult::Failed;
        }
    };

    let Some(request) = table.request_for(route, source, candidate.path()) else {
        // build_route_table validated destinations; this is unreachable in practice.
        error!(route = route.name(), "route destination disappeared from table");
        return FileResult::Failed;
    };

    if cfg.dry_run {
        return dry_run_one(candidate, route.name(), &request);
    }

    match mover.move_file(&request) {
        Ok(TransferOutcome::Skipped) => {
            info!(
                file = %candidate.path().display(),
                route = route.name(),
                condition = %request.condition,
                "skipped by condition"
            );
            FileResult::Skipped
        }
        Ok(outcome) => {
            info!(
                file = %candidate.path().display(),
                route = route.name(),
                outcome = ?outcome,
                "routed"
            );
            FileResult::Moved
        }
        Err(e) => {
            match &e {
                TransferError::SourceDeletion { rolled_back, .. } => {
                    error!(
                        kind = e.kind(),
                        file = %candidate.path().display(),
                        route = route.name(),
                        rolled_back,
                        "move failed after copy"
                    );
                }
                _ => {
                    error!(
                        kind = e.kind(),
                        file = %candidate.path().display(),
                        route = route.name(),
                        error = %e,
                        "move failed"
                    );
                }
            }
            FileResult::Failed
        }
    }
}

/// Evaluate the route's condition without mutating anything.
fn dry_run_one(candidate: &Candidate, route_name: &str, request: &crate::transfer::TransferRequest) -> FileResult {
    let src_meta = match request.src.metadata(&request.src_path) {
        Ok(Some(meta)) => meta,
        Ok(None) => {
            warn!(file = %request.src_path.display(), "dry-run: source vanished before evaluation");
            return FileResult::Failed;
        }
        Err(e) => {
            error!(file = %request.src_path.display(), error = %e, "dry-run: cannot stat source");
            return FileResult::Failed;
        }
    };
    let dst_meta = match request.dst.metadata(&request.dst_path) {
        Ok(meta) => meta,
        Err(e) => {
            error!(file = %request.dst_path.display(), error = %e, "dry-run: cannot stat destination");
            return FileResult::Failed;
        }
    };

    if request.condition.decide(&src_meta, dst_meta.as_ref()) {
        info!(
            file = %candidate.path().display(),
            route = route_name,
            dest = %request.dst_path.display(),
            "dry-run: would move"
        );
        FileResult::Moved
    } else {
        info!(
            file = %candidate.path().display(),
            route = route_name,
            condition = %request.condition,
            "dry-run: would skip"
        );
        FileResult::Skipped
    }
}

/// Gather candidates: explicit CLI paths when given, otherwise a bounded scan
/// of the source base. Paths are made relative to the source handle.
fn collect_candidates(
    args: &Args,
    cfg: &Config,
    source: &StorageHandle,
    table: &RouteTable,
) -> Result<Vec<Candidate>> {
    let load_payloads = table.needs_payload();
    let mut candidates = Vec::new();

    if !args.files.is_empty() {
        let base_real =
            dunce::canonicalize(&cfg.source_base).unwrap_or_else(|_| cfg.source_base.clone());
        for file in &args.files {
            let rel = if file.is_absolute() {
                match file.strip_prefix(&base_real) {
                    Ok(rel) => rel.to_path_buf(),
                    Err(_) => bail!(
                        "file '{}' is not under the source base '{}'",
                        file.display(),
                        base_real.display()
                    ),
                }
            } else {
                file.clone()
            };
            if source
                .metadata(&rel)
                .with_context(|| format!("stat '{}'", rel.display()))?
                .is_none()
            {
                bail!("file not found under source base: {}", rel.display());
            }
            candidates.push(make_candidate(source, rel, load_payloads));
        }
        return Ok(candidates);
    }

    for entry in WalkDir::new(&cfg.source_base)
        .min_depth(1)
        .max_depth(cfg.scan_depth)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        // Skip dotfiles, including our own in-flight copy temporaries.
        if name.starts_with('.') {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(&cfg.source_base) else {
            continue;
        };
        candidates.push(make_candidate(source, rel.to_path_buf(), load_payloads));
    }
    Ok(candidates)
}

fn make_candidate(source: &StorageHandle, rel: PathBuf, load_payload: bool) -> Candidate {
    let candidate = Candidate::new(rel);
    if !load_payload {
        return candidate;
    }
    match read_payload(source, candidate.path()) {
        Ok(payload) => candidate.with_payload(payload),
        Err(e) => {
            // Binary or unreadable content: content filters simply won't match.
            debug!(file = %candidate.path().display(), error = %e, "payload not loaded");
            candidate
        }
    }
}

fn read_payload(source: &StorageHandle, rel: &Path) -> std::io::Result<String> {
    use std::io::Read;
    let mut buf = String::new();
    source.reader(rel)?.read_to_string(&mut buf)?;
    Ok(buf)
}

fn print_routes(table: &RouteTable) {
    for route in table.routes() {
        out::print_user(&format!(
            "{}: if {} -> '{}' (condition: {})",
            route.name(),
            route.filter().describe(),
            route.destination(),
            route.condition()
        ));
    }
}
