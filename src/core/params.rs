//! core::params
//!
//! Resolved connection parameters and the recognized `P4*` key set.
//!
//! # Identity
//!
//! Two parameter sets are equal when they name the same server, user,
//! client and password. Charset and the config/ignore file names are
//! metadata and do not take part in equality, nor do warnings or errors.
//!
//! # Example
//!
//! ```
//! use p4conn::core::params::{ConnectionParameters, P4Field};
//!
//! let mut params = ConnectionParameters::default();
//! params.set_field(P4Field::Port, "perforce:1666");
//! params.set_field(P4Field::User, "alice");
//! assert!(!params.all_fields_defined());
//!
//! params.set_field(P4Field::Client, "alice-ws");
//! params.set_field(P4Field::Password, "secret");
//! assert!(params.all_fields_defined());
//! ```

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Fatal problem attached to a single root during resolution.
///
/// A root carrying one of these is unusable, but resolution of its
/// siblings continues.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum ResolutionError {
    #[error("failed to read config file '{path}': {message}")]
    ReadConfig { path: PathBuf, message: String },
}

/// The recognized Perforce configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum P4Field {
    Port,
    Client,
    User,
    Password,
    Charset,
    Config,
    Ignore,
}

impl P4Field {
    /// Every recognized key.
    pub const ALL: [P4Field; 7] = [
        P4Field::Port,
        P4Field::Client,
        P4Field::User,
        P4Field::Password,
        P4Field::Charset,
        P4Field::Config,
        P4Field::Ignore,
    ];

    /// Keys resolved per directory. Config and ignore names are metadata.
    pub const CONNECTION: [P4Field; 5] = [
        P4Field::Port,
        P4Field::Client,
        P4Field::User,
        P4Field::Password,
        P4Field::Charset,
    ];

    /// Environment variable (and config file key) for this field.
    pub fn env_name(self) -> &'static str {
        match self {
            P4Field::Port => "P4PORT",
            P4Field::Client => "P4CLIENT",
            P4Field::User => "P4USER",
            P4Field::Password => "P4PASSWD",
            P4Field::Charset => "P4CHARSET",
            P4Field::Config => "P4CONFIG",
            P4Field::Ignore => "P4IGNORE",
        }
    }

    /// Global `p4` option that passes this field on the command line.
    pub fn flag(self) -> Option<&'static str> {
        match self {
            P4Field::Port => Some("-p"),
            P4Field::Client => Some("-c"),
            P4Field::User => Some("-u"),
            P4Field::Password => Some("-P"),
            P4Field::Charset => Some("-C"),
            P4Field::Config | P4Field::Ignore => None,
        }
    }

    /// Match a key case-insensitively against the recognized set.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.env_name().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for P4Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.env_name())
    }
}

/// Connection parameters resolved for one directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionParameters {
    pub server: Option<String>,
    pub user: Option<String>,
    pub client: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub charset: Option<String>,
    pub config_file_name: Option<String>,
    pub ignore_file_name: Option<String>,
    /// Non-fatal problems found while resolving.
    pub warnings: Vec<String>,
    /// Set when this root cannot be used.
    pub fatal_error: Option<ResolutionError>,
    /// Set when no config file was found for the directory.
    no_config: bool,
}

impl PartialEq for ConnectionParameters {
    fn eq(&self, other: &Self) -> bool {
        self.server == other.server
            && self.user == other.user
            && self.client == other.client
            && self.password == other.password
    }
}

impl Eq for ConnectionParameters {}

impl ConnectionParameters {
    /// Parameters for a directory with no config file on its ancestor chain.
    pub fn no_config_found(config_file_name: Option<&str>) -> Self {
        let mut params = Self {
            config_file_name: config_file_name.map(str::to_string),
            no_config: true,
            ..Default::default()
        };
        match config_file_name {
            Some(name) => params.warn(format!("no {} found in directory hierarchy", name)),
            None => params.warn("P4CONFIG is not set; config files cannot be located"),
        }
        params
    }

    /// True if this set was produced for a directory without a config file.
    pub fn is_no_config(&self) -> bool {
        self.no_config
    }

    /// True when server, user, client and password are all known.
    pub fn all_fields_defined(&self) -> bool {
        self.server.is_some()
            && self.user.is_some()
            && self.client.is_some()
            && self.password.is_some()
    }

    /// True when the set carries warnings or a fatal error.
    pub fn has_problems(&self) -> bool {
        !self.warnings.is_empty() || self.fatal_error.is_some()
    }

    /// Record a non-fatal warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Read a field.
    pub fn get_field(&self, field: P4Field) -> Option<&str> {
        match field {
            P4Field::Port => self.server.as_deref(),
            P4Field::Client => self.client.as_deref(),
            P4Field::User => self.user.as_deref(),
            P4Field::Password => self.password.as_deref(),
            P4Field::Charset => self.charset.as_deref(),
            P4Field::Config => self.config_file_name.as_deref(),
            P4Field::Ignore => self.ignore_file_name.as_deref(),
        }
    }

    /// Overwrite a field.
    pub fn set_field(&mut self, field: P4Field, value: impl Into<String>) {
        let value = Some(value.into());
        match field {
            P4Field::Port => self.server = value,
            P4Field::Client => self.client = value,
            P4Field::User => self.user = value,
            P4Field::Password => self.password = value,
            P4Field::Charset => self.charset = value,
            P4Field::Config => self.config_file_name = value,
            P4Field::Ignore => self.ignore_file_name = value,
        }
    }

    /// Copy every field of `other` that is still unset here.
    ///
    /// Warnings and errors are not copied.
    pub fn fill_missing_from(&mut self, other: &ConnectionParameters) {
        for field in P4Field::ALL {
            if self.get_field(field).is_none() {
                if let Some(value) = other.get_field(field) {
                    self.set_field(field, value);
                }
            }
        }
    }

    /// Fill every unset field from a lookup function, usually the environment.
    pub fn fill_missing_with(&mut self, mut lookup: impl FnMut(P4Field) -> Option<String>) {
        for field in P4Field::ALL {
            if self.get_field(field).is_none() {
                if let Some(value) = lookup(field) {
                    self.set_field(field, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(server: &str, user: &str) -> ConnectionParameters {
        let mut p = ConnectionParameters::default();
        p.set_field(P4Field::Port, server);
        p.set_field(P4Field::User, user);
        p
    }

    #[test]
    fn equality_ignores_metadata() {
        let mut a = params("s:1666", "bob");
        let mut b = params("s:1666", "bob");
        a.set_field(P4Field::Charset, "utf8");
        b.set_field(P4Field::Config, ".p4config");
        b.warn("something");
        assert_eq!(a, b);
    }

    #[test]
    fn equality_uses_identity_fields() {
        assert_ne!(params("s1:1666", "bob"), params("s2:1666", "bob"));
        let mut a = params("s:1666", "bob");
        a.set_field(P4Field::Password, "x");
        assert_ne!(a, params("s:1666", "bob"));
    }

    #[test]
    fn from_key_is_case_insensitive() {
        assert_eq!(P4Field::from_key("p4port"), Some(P4Field::Port));
        assert_eq!(P4Field::from_key(" P4Passwd "), Some(P4Field::Password));
        assert_eq!(P4Field::from_key("P4EDITOR"), None);
    }

    #[test]
    fn fill_missing_keeps_existing_values() {
        let mut near = params("near:1666", "alice");
        let mut far = params("far:1666", "bob");
        far.set_field(P4Field::Client, "far-ws");
        near.fill_missing_from(&far);
        assert_eq!(near.server.as_deref(), Some("near:1666"));
        assert_eq!(near.user.as_deref(), Some("alice"));
        assert_eq!(near.client.as_deref(), Some("far-ws"));
    }

    #[test]
    fn no_config_marker_carries_warning() {
        let p = ConnectionParameters::no_config_found(Some(".p4config"));
        assert!(p.is_no_config());
        assert!(p.has_problems());
        assert!(p.warnings[0].contains(".p4config"));
    }

    #[test]
    fn flags_for_connection_fields() {
        assert_eq!(P4Field::Password.flag(), Some("-P"));
        assert_eq!(P4Field::Config.flag(), None);
    }
}
