//! cli
//!
//! Command-line interface layer for p4conn.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the log subscriber
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It loads settings, builds a
//! [`ConnectionManager`] for the project and uses it only through
//! [`crate::connection`]. Every resolution and execution rule lives in the
//! library.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use crate::connection::ConnectionManager;
use crate::core::config::Settings;
use crate::core::env::Environment;
use crate::core::paths::normalize;
use crate::ui::output::Verbosity;

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Roots given on the command line.
    pub roots: Vec<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// JSON output.
    pub json: bool,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    /// The project directory: `--cwd`, or the current directory.
    pub fn project_dir(&self) -> Result<PathBuf> {
        let dir = match &self.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        Ok(normalize(&dir))
    }

    /// Roots to resolve, relative ones taken from the project directory.
    pub fn roots(&self, project_dir: &Path) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            return vec![project_dir.to_path_buf()];
        }
        self.roots
            .iter()
            .map(|root| normalize(&project_dir.join(root)))
            .collect()
    }

    /// Resolve a path given on the command line.
    pub fn path_arg(&self, path: &Path) -> Result<PathBuf> {
        Ok(normalize(&self.project_dir()?.join(path)))
    }

    pub fn load_settings(&self) -> Result<Settings> {
        let project_dir = self.project_dir()?;
        let loaded = Settings::load(Some(&project_dir)).context("Failed to load settings")?;
        Ok(loaded.settings)
    }

    /// A connection manager for the project, using the real environment.
    pub fn manager(&self) -> Result<ConnectionManager> {
        let project_dir = self.project_dir()?;
        let settings = self.load_settings()?;
        let roots = self.roots(&project_dir);
        Ok(ConnectionManager::from_settings(
            settings,
            project_dir,
            roots,
            Environment::inherited(),
        ))
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("p4conn=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the CLI application and return the process exit code.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<i32> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let ctx = Context {
        cwd: cli.cwd.clone(),
        roots: cli.roots.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
        json: cli.json,
    };

    commands::dispatch(cli.command, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_default_to_project_dir() {
        let ctx = Context::default();
        assert_eq!(ctx.roots(Path::new("/ws")), vec![PathBuf::from("/ws")]);
    }

    #[test]
    fn relative_roots_join_project_dir() {
        let ctx = Context {
            roots: vec![PathBuf::from("a/../b"), PathBuf::from("/abs")],
            ..Default::default()
        };
        assert_eq!(
            ctx.roots(Path::new("/ws")),
            vec![PathBuf::from("/ws/b"), PathBuf::from("/abs")]
        );
    }
}
