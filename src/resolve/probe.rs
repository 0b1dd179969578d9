//! resolve::probe
//!
//! Asking the client which settings it would use (`p4 set`).
//!
//! # Output Format
//!
//! One variable per line:
//!
//! ```text
//! P4CONFIG=.p4config (set)
//! P4PORT=ssl:perforce:1666 (config '/ws/.p4config')
//! P4USER=alice (enviro)
//! P4CLIENT=alice-ws (config 'noconfig')
//! ```
//!
//! The value ends where the first source tag starts. Every recognized key
//! is recorded for the probed directory. Values that came from the shell
//! environment (`(set`, `(env...`) or from a config file that was asked for
//! but not found (`(config ... 'noconfig')`) do not depend on the directory,
//! so they are also promoted to the project-wide defaults.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::params::{ConnectionParameters, P4Field};
use crate::exec::{CancellationToken, Cancelled, CommandSpec, ProcessExecutionChannel};

const SOURCE_TAGS: [&str; 3] = ["(config", "(set", "(env"];
const NO_CONFIG_MARKER: &str = "'noconfig'";

/// Parsed `p4 set` output.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutput {
    /// Every recognized value, as seen from the probed directory.
    pub local: ConnectionParameters,
    /// Values that apply to every directory.
    pub defaults: ConnectionParameters,
}

/// Split one output line into field, value and source tag.
fn parse_line(line: &str) -> Option<(P4Field, &str, Option<&str>)> {
    let (key, rest) = line.split_once('=')?;
    let field = P4Field::from_key(key)?;
    let tag_start = SOURCE_TAGS.iter().filter_map(|tag| rest.find(tag)).min();
    let (value, tag) = match tag_start {
        Some(at) => (&rest[..at], Some(rest[at..].trim())),
        None => (rest, None),
    };
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some((field, value, tag))
}

fn is_directory_independent(tag: &str) -> bool {
    tag.starts_with("(set")
        || tag.starts_with("(env")
        || (tag.starts_with("(config") && tag.contains(NO_CONFIG_MARKER))
}

/// Parse the stdout of `p4 set`. Unrecognized lines are skipped.
pub fn parse_set_output(stdout: &str) -> ProbeOutput {
    let mut output = ProbeOutput::default();
    for line in stdout.lines() {
        let Some((field, value, tag)) = parse_line(line.trim()) else {
            continue;
        };
        output.local.set_field(field, value);
        if tag.is_some_and(is_directory_independent) {
            output.defaults.set_field(field, value);
        }
    }
    output
}

/// Runs `p4 set` through an execution channel.
#[derive(Debug, Clone)]
pub struct EnvironmentProbe {
    channel: Arc<ProcessExecutionChannel>,
    timeout: Duration,
}

impl EnvironmentProbe {
    pub fn new(channel: Arc<ProcessExecutionChannel>, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    /// Probe `dir`.
    ///
    /// A failed probe is not an error: the result is empty apart from a
    /// warning on the defaults, and resolution continues from config files
    /// and the environment.
    pub fn probe(&self, dir: &Path, cancel: &CancellationToken) -> Result<ProbeOutput, Cancelled> {
        let spec = CommandSpec::new(dir, vec!["set".to_string()], self.timeout);
        let result = self.channel.run(&spec, cancel)?;

        if !result.is_success() {
            let reason = match &result.error {
                Some(e) => e.to_string(),
                None => format!("exit code {}: {}", result.exit_code, result.stderr.trim()),
            };
            warn!(dir = %dir.display(), %reason, "environment probe failed");
            let mut output = ProbeOutput::default();
            output
                .defaults
                .warn(format!("'{} set' failed: {}", self.channel.executable(), reason));
            return Ok(output);
        }

        let output = parse_set_output(&result.stdout);
        debug!(
            dir = %dir.display(),
            config = ?output.defaults.config_file_name,
            "environment probe finished"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
P4CHARSET=utf8 (set)
P4CONFIG=.p4config (set) (config 'noconfig')
P4PORT=ssl:perforce:1666 (config '/ws/.p4config')
P4USER=alice (enviro)
P4CLIENT=alice-ws (config 'noconfig')
P4EDITOR=vim (set)
";

    #[test]
    fn values_are_truncated_at_tag() {
        let out = parse_set_output(SAMPLE);
        assert_eq!(out.local.server.as_deref(), Some("ssl:perforce:1666"));
        assert_eq!(out.local.config_file_name.as_deref(), Some(".p4config"));
        assert_eq!(out.local.charset.as_deref(), Some("utf8"));
    }

    #[test]
    fn environment_values_are_promoted() {
        let out = parse_set_output(SAMPLE);
        assert_eq!(out.defaults.user.as_deref(), Some("alice"));
        assert_eq!(out.defaults.charset.as_deref(), Some("utf8"));
        assert_eq!(out.defaults.config_file_name.as_deref(), Some(".p4config"));
        assert_eq!(out.defaults.client.as_deref(), Some("alice-ws"));
    }

    #[test]
    fn config_file_values_stay_local() {
        let out = parse_set_output(SAMPLE);
        assert!(out.defaults.server.is_none());
    }

    #[test]
    fn untagged_value_is_local_only() {
        let out = parse_set_output("P4PORT=1666\n");
        assert_eq!(out.local.server.as_deref(), Some("1666"));
        assert!(out.defaults.server.is_none());
    }

    #[test]
    fn junk_is_skipped() {
        let out = parse_set_output("garbage\nP4PORT=\n\n");
        assert!(out.local.server.is_none());
        assert!(out.local.warnings.is_empty());
    }

    #[test]
    fn missing_executable_yields_warning() {
        let channel = Arc::new(ProcessExecutionChannel::new(
            "/no/such/p4",
            crate::core::env::Environment::isolated(),
        ));
        let probe = EnvironmentProbe::new(channel, Duration::from_secs(5));
        let out = probe
            .probe(&std::env::temp_dir(), &CancellationToken::new())
            .unwrap();
        assert_eq!(out.defaults.warnings.len(), 1);
        assert!(out.defaults.server.is_none());
    }
}
