//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory (the project directory)
//! - `--root <dir>`: Version-controlled root, repeatable; defaults to the
//!   project directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--json`: Machine-readable output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// p4conn - Perforce connection resolution for multi-root working trees
#[derive(Parser, Debug)]
#[command(name = "p4conn")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if p4conn was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Version-controlled root (repeatable, defaults to the project directory)
    #[arg(long = "root", value_name = "DIR", global = true)]
    pub roots: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the resolved roots and their connection parameters
    #[command(
        name = "roots",
        long_about = "Show the resolved roots and their connection parameters.\n\n\
            Every root is mapped to the nearest config file above it. Roots that \
            share a config directory, or resolve to the same server identity as an \
            enclosing root, are merged into the outer root.",
        after_help = "\
EXAMPLES:
    # Resolve the project directory as the only root
    p4conn roots

    # Resolve several roots
    p4conn roots --root depot/main --root depot/rel"
    )]
    Roots,

    /// Show which connection owns a file
    #[command(name = "resolve")]
    Resolve {
        /// File or directory to look up
        file: PathBuf,
    },

    /// Run a p4 command against the connection owning a file
    #[command(
        name = "run",
        after_help = "\
EXAMPLES:
    # p4 opened, in the connection of src/main.c
    p4conn run src/main.c -- opened

    # Feed a change spec on stdin
    p4conn run src/main.c --stdin -- change -i < change.txt"
    )]
    Run {
        /// File whose connection is used
        file: PathBuf,

        /// Deadline in milliseconds (defaults to server_timeout_ms)
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Pass this process's stdin to the client
        #[arg(long)]
        stdin: bool,

        /// Arguments passed to p4
        #[arg(last = true, required = true)]
        args: Vec<String>,
    },

    /// Get, set, or list settings
    #[command(
        name = "config",
        after_help = "\
EXAMPLES:
    # List effective settings
    p4conn config list

    # Use a different config file name in this project
    p4conn config set config_file_name .p4env"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    # Bash (add to ~/.bashrc)
    p4conn completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    p4conn completion zsh >> ~/.zshrc"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Get an effective settings value
    Get {
        /// Settings key
        key: String,
    },
    /// Set a value in the project settings file
    Set {
        /// Settings key
        key: String,
        /// Value to set
        value: String,
    },
    /// List all effective settings
    List,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_takes_trailing_args() {
        let cli = Cli::try_parse_from([
            "p4conn", "--root", "a", "--root", "b", "run", "f.c", "--", "opened", "-c", "12",
        ])
        .unwrap();
        assert_eq!(cli.roots.len(), 2);
        match cli.command {
            Command::Run { file, args, .. } => {
                assert_eq!(file, PathBuf::from("f.c"));
                assert_eq!(args, vec!["opened", "-c", "12"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
