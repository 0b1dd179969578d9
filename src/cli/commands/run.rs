//! run command - Execute p4 in the connection owning a file

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::connection::CommandRequest;
use crate::exec::{CancellationToken, ExecError};
use crate::ui::output;

/// Run `p4 <args>` and pass through its output and exit code.
pub fn run(
    ctx: &Context,
    file: &Path,
    timeout_ms: Option<u64>,
    stdin: bool,
    args: Vec<String>,
) -> Result<i32> {
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
    if let Some(err) = &conn.parameters().fatal_error {
        bail!("Connection for '{}' is unusable: {}", conn.working_dir().display(), err);
    }

    let mut request = CommandRequest::new(args);
    if let Some(ms) = timeout_ms {
        request = request.with_timeout(Duration::from_millis(ms));
    }
    if stdin {
        let input = io::read_to_string(io::stdin()).context("Failed to read stdin")?;
        request = request.with_stdin(input);
    }

    output::debug(format!("running in {}", conn.working_dir().display()), verbosity);
    let result = conn
        .execute(&request, &cancel)
        .context("Command cancelled")?;

    if ctx.json {
        output::json(&result)?;
        return Ok(result.exit_code);
    }

    match &result.error {
        Some(err @ ExecError::Spawn { .. }) => bail!("{}", err),
        Some(ExecError::Timeout { .. }) => output::warn(&result.stderr, verbosity),
        Some(ExecError::Refused { .. }) => {
            output::warn("server refused the connection", verbosity);
        }
        Some(ExecError::Io { message }) => bail!("Failed waiting for p4: {}", message),
        None => {}
    }

    io::stdout()
        .write_all(result.stdout.as_bytes())
        .context("Failed to write output")?;
    if !result.timed_out() {
        io::stderr()
            .write_all(result.stderr.as_bytes())
            .context("Failed to write output")?;
    }

    Ok(result.exit_code)
}
