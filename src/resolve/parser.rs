//! resolve::parser
//!
//! Direct reading of `KEY=VALUE` config files.
//!
//! # Format
//!
//! One pair per line. The first `=` splits key from value and both sides
//! are trimmed. Keys match the recognized `P4*` set case-insensitively.
//! Blank lines, `#` comments and unrecognized keys are skipped. A
//! non-blank line without `=` is reported as a warning. There is no
//! quoting or escaping.
//!
//! # Stacking
//!
//! When several config files sit on one ancestor chain, they are applied
//! farthest first so that the nearest file wins.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::params::{ConnectionParameters, P4Field, ResolutionError};

/// Parse config file text into `params`, overwriting the keys it sets.
///
/// `origin` is used only for warning messages.
pub fn parse_config_text(text: &str, origin: &Path, params: &mut ConnectionParameters) {
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            params.warn(format!(
                "{}:{}: ignoring line without '=': {}",
                origin.display(),
                index + 1,
                line
            ));
            continue;
        };
        let Some(field) = P4Field::from_key(key) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        params.set_field(field, value);
    }
}

/// Read one config file into `params`.
///
/// I/O failures become the fatal error of `params`.
pub fn read_config_file(path: &Path, params: &mut ConnectionParameters) {
    match fs::read_to_string(path) {
        Ok(text) => parse_config_text(&text, path, params),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "config file unreadable");
            params.fatal_error = Some(ResolutionError::ReadConfig {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    }
}

/// Apply stacked config files given nearest first.
///
/// Files are read in reverse so nearer files override farther ones.
pub fn read_stacked(files_nearest_first: &[PathBuf]) -> ConnectionParameters {
    let mut params = ConnectionParameters::default();
    for path in files_nearest_first.iter().rev() {
        read_config_file(path, &mut params);
    }
    params
}
