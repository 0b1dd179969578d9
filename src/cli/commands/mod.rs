//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Builds what it needs from the [`Context`] (settings, manager)
//! 2. Calls into the library
//! 3. Formats and displays output
//!
//! Handlers return the process exit code. Only `run` passes through a
//! code other than 0: the one reported by the client.

mod completion;
mod config_cmd;
mod resolve;
mod roots;
mod run;

// Re-export command functions for testing and direct invocation
pub use completion::completion;
pub use config_cmd::{get as config_get, list as config_list, set as config_set};
pub use resolve::resolve;
pub use roots::roots;
pub use run::run;

use crate::cli::args::{Command, ConfigAction};
use crate::cli::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<i32> {
    match command {
        Command::Roots => roots::roots(ctx),
        Command::Resolve { file } => resolve::resolve(ctx, &file),
        Command::Run {
            file,
            timeout_ms,
            stdin,
            args,
        } => run::run(ctx, &file, timeout_ms, stdin, args),
        Command::Config { action } => match action {
            ConfigAction::Get { key } => config_cmd::get(ctx, &key),
            ConfigAction::Set { key, value } => config_cmd::set(ctx, &key, &value),
            ConfigAction::List => config_cmd::list(ctx),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}
