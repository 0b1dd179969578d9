//! resolve command - Show which connection owns a file

use std::path::Path;

use anyhow::{bail, Context as _, Result};
use serde::Serialize;

use crate::cli::Context;
use crate::core::params::ConnectionParameters;
use crate::core::types::{ConnectionId, ConnectionKey, ConnectionState};
use crate::exec::CancellationToken;
use crate::ui::output;

#[derive(Serialize)]
struct ResolveReport<'a> {
    file: &'a Path,
    working_dir: &'a Path,
    id: &'a ConnectionId,
    key: ConnectionKey,
    state: ConnectionState,
    parameters: &'a ConnectionParameters,
}

/// Print the connection owning `file`.
pub fn resolve(ctx: &Context, file: &Path) -> Result<i32> {
    let verbosity = ctx.verbosity();
    let file = ctx.path_arg(file)?;
    let manager = ctx.manager()?;
    let cancel = CancellationToken::new();

    let Some(conn) = manager
        .connection_for(&file, &cancel)
        .context("Failed to resolve connections")?
    else {
        bail!("No connection covers '{}'", file.display());
    };

    if ctx.json {
        output::json(&ResolveReport {
            file: &file,
            working_dir: conn.working_dir(),
            id: conn.id(),
            key: conn.key(),
            state: conn.state(),
            parameters: conn.parameters(),
        })?;
        return Ok(0);
    }

    println!("{}", conn.working_dir().display());
    output::print(format!("  connection: {}", conn.id()), verbosity);
    output::print(format!("  server: {}", conn.key()), verbosity);
    output::print(format!("  {}", output::format_params(conn.parameters())), verbosity);
    for warning in &conn.parameters().warnings {
        output::warn(warning, verbosity);
    }
    if let Some(err) = &conn.parameters().fatal_error {
        output::error(err);
        return Ok(1);
    }

    Ok(0)
}
