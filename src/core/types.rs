//! core::types
//!
//! Identity types for connections.
//!
//! # Types
//!
//! - [`ConnectionId`] - Cache key for a logical connection
//! - [`ConnectionKey`] - Server identity (server, client, user)
//! - [`ConnectionState`] - Advisory connected/not-connected state
//!
//! # Examples
//!
//! ```
//! use p4conn::core::types::ConnectionId;
//! use std::path::PathBuf;
//!
//! let a = ConnectionId::config(Some(".p4config"), PathBuf::from("/ws/a"));
//! let b = ConnectionId::config(Some(".p4config"), PathBuf::from("/ws/a"));
//! assert_eq!(a, b);
//! assert_ne!(a, ConnectionId::Singleton);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::params::ConnectionParameters;

/// Identifies a logical connection.
///
/// Two connections are the same connection iff their ids are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ConnectionId {
    /// A connection driven by config files found from `working_dir`.
    Config {
        config_file_name: Option<String>,
        working_dir: PathBuf,
    },
    /// The one project-wide connection built from settings.
    Singleton,
}

impl ConnectionId {
    /// Build a config-driven id.
    pub fn config(config_file_name: Option<&str>, working_dir: PathBuf) -> Self {
        ConnectionId::Config {
            config_file_name: config_file_name.map(str::to_string),
            working_dir,
        }
    }

    /// The working directory, if this id has one.
    pub fn working_dir(&self) -> Option<&Path> {
        match self {
            ConnectionId::Config { working_dir, .. } => Some(working_dir),
            ConnectionId::Singleton => None,
        }
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionId::Config {
                config_file_name,
                working_dir,
            } => write!(
                f,
                "{} ({})",
                working_dir.display(),
                config_file_name.as_deref().unwrap_or("no P4CONFIG")
            ),
            ConnectionId::Singleton => f.write_str("<project>"),
        }
    }
}

/// Server identity independent of working directory.
///
/// Used to group roots that talk to the same server and workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionKey {
    pub server: Option<String>,
    pub client: Option<String>,
    pub user: Option<String>,
}

impl ConnectionKey {
    pub fn from_params(params: &ConnectionParameters) -> Self {
        Self {
            server: params.server.clone(),
            client: params.client.clone(),
            user: params.user.clone(),
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} ({})",
            self.user.as_deref().unwrap_or("?"),
            self.server.as_deref().unwrap_or("?"),
            self.client.as_deref().unwrap_or("?")
        )
    }
}

/// Advisory connection state, driven by the outcome of the last command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Unknown,
    Connected,
    NotConnected,
}

impl ConnectionState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Unknown => 0,
            ConnectionState::Connected => 1,
            ConnectionState::NotConnected => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connected,
            2 => ConnectionState::NotConnected,
            _ => ConnectionState::Unknown,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Unknown => "unknown",
            ConnectionState::Connected => "connected",
            ConnectionState::NotConnected => "not connected",
        };
        f.write_str(s)
    }
}
