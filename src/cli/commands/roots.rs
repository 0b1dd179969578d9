//! roots command - Show the resolved root mapping

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde::Serialize;

use crate::cli::Context;
use crate::core::params::ConnectionParameters;
use crate::exec::CancellationToken;
use crate::ui::output;

#[derive(Serialize)]
struct RootReport<'a> {
    root: PathBuf,
    config_dir: Option<PathBuf>,
    parameters: &'a ConnectionParameters,
}

#[derive(Serialize)]
struct RootsReport<'a> {
    config_file_name: Option<&'a str>,
    defaults: Option<&'a ConnectionParameters>,
    roots: Vec<RootReport<'a>>,
}

/// Print every surviving root with its parameters.
pub fn roots(ctx: &Context) -> Result<i32> {
    let verbosity = ctx.verbosity();
    let manager = ctx.manager()?;
    let cancel = CancellationToken::new();
    let mapper = manager
        .mapper(&cancel)
        .context("Failed to resolve connections")?;
    let connections = mapper.all_connections();
    let mapping = mapper.mapping();

    let reports: Vec<RootReport<'_>> = connections
        .iter()
        .map(|(root, conn)| RootReport {
            root: root.clone(),
            config_dir: mapping
                .and_then(|m| m.config_dir(root))
                .map(|d| d.to_path_buf()),
            parameters: conn.parameters(),
        })
        .collect();

    if ctx.json {
        output::json(&RootsReport {
            config_file_name: mapping.and_then(|m| m.config_file_name()),
            defaults: mapping.map(|m| m.defaults()),
            roots: reports,
        })?;
        return Ok(0);
    }

    if mapping.is_none() {
        output::debug("single connection mode (use_p4config = false)", verbosity);
    }
    for report in &reports {
        println!("{}", report.root.display());
        if let Some(dir) = &report.config_dir {
            output::print(format!("  config: {}", dir.display()), verbosity);
        }
        output::print(format!("  {}", output::format_params(report.parameters)), verbosity);
        for warning in &report.parameters.warnings {
            output::warn(format!("{}: {}", report.root.display(), warning), verbosity);
        }
        if let Some(err) = &report.parameters.fatal_error {
            output::error(format!("{}: {}", report.root.display(), err));
        }
    }
    if let Some(defaults) = mapping.map(|m| m.defaults()) {
        for warning in &defaults.warnings {
            output::warn(warning, verbosity);
        }
    }

    Ok(0)
}
