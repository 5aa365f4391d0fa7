//! Route-table assembly and validation.
//!
//! Turns the parsed configuration into live storage handles and an immutable
//! route table. Everything order-sensitive or ambiguous fails here, before
//! any file is touched: unknown filter kinds, bad patterns, missing
//! conditions, duplicate route names, unresolvable destinations.

use anyhow::{Context, Result, bail};
use std::fs;
use tracing::{info, warn};

use super::types::{Config, FilterConfig};
use crate::routing::{Filter, Route, RouteTable};
use crate::storage::{LocalFs, StorageHandle};
use crate::transfer::Condition;

/// Build the source handle and the validated route table for `cfg`.
pub fn build_route_table(cfg: &Config) -> Result<(StorageHandle, RouteTable)> {
    if !cfg.source_base.exists() {
        bail!("source_base does not exist: {}", cfg.source_base.display());
    }
    if !cfg.source_base.is_dir() {
        bail!(
            "source_base is not a directory: {}",
            cfg.source_base.display()
        );
    }
    // readability probe
    fs::read_dir(&cfg.source_base).with_context(|| {
        format!(
            "Cannot read source_base directory '{}'; check permissions",
            cfg.source_base.display()
        )
    })?;

    let source = LocalFs::open(&cfg.source_base)
        .with_context(|| format!("open source_base '{}'", cfg.source_base.display()))?;

    let src_real = fs::canonicalize(&cfg.source_base).unwrap_or_else(|_| cfg.source_base.clone());

    let mut builder = RouteTable::builder();
    for dest in &cfg.destinations {
        if dest.name.is_empty() {
            bail!("destination with empty name (path '{}')", dest.path.display());
        }
        let handle = LocalFs::create(&dest.path).with_context(|| {
            format!(
                "create destination '{}' at '{}'",
                dest.name,
                dest.path.display()
            )
        })?;

        let dest_real = fs::canonicalize(&dest.path).unwrap_or_else(|_| dest.path.clone());
        if dest_real == src_real {
            bail!(
                "destination '{}' resolves to the source_base itself: {}",
                dest.name,
                dest_real.display()
            );
        }
        if dest_real.starts_with(&src_real) {
            // Files routed here would be re-scanned as new candidates.
            warn!(
                destination = dest.name,
                path = %dest_real.display(),
                "destination lies inside source_base; routed files will show up in later scans"
            );
        }

        builder = builder.destination(&dest.name, handle);
    }

    for route_cfg in &cfg.routes {
        let condition: Condition = route_cfg
            .condition
            .as_deref()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "route '{}' has no condition; one of always|not_exists|exists|newer|older is required",
                    route_cfg.name
                )
            })?
            .parse()
            .with_context(|| format!("route '{}'", route_cfg.name))?;

        let filter = compile_filter(&route_cfg.filter)
            .with_context(|| format!("route '{}'", route_cfg.name))?;

        builder = builder.route(
            Route::new(
                &route_cfg.name,
                filter,
                &route_cfg.destination,
                &route_cfg.dest_dir,
                condition,
            )
            .preserve_time(route_cfg.preserve_time)
            .cleanup_destination_on_error(route_cfg.cleanup_on_error),
        );
    }

    let table = builder.build().context("validate route table")?;
    info!(
        source = %cfg.source_base.display(),
        destinations = cfg.destinations.len(),
        routes = table.routes().len(),
        "route table built"
    );
    Ok((source, table))
}

fn compile_filter(fc: &FilterConfig) -> Result<Filter> {
    let pattern = || {
        fc.pattern
            .as_deref()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("filter kind '{}' requires a pattern", fc.kind))
    };
    match fc.kind.as_str() {
        "any" => Ok(Filter::Any),
        "name_contains" => Ok(Filter::NameContains(pattern()?)),
        "name_matches" => {
            let p = pattern()?;
            Filter::name_matches(&p).with_context(|| format!("compile pattern '{p}'"))
        }
        "extension" => Ok(Filter::Extension(pattern()?.trim_start_matches('.').to_string())),
        "content_contains" => Ok(Filter::ContentContains(pattern()?)),
        other => bail!(
            "unknown filter kind '{other}' (expected one of: any, name_contains, name_matches, extension, content_contains)"
        ),
    }
}
