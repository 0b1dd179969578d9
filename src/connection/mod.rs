//! connection
//!
//! The executable channel for one resolved root.
//!
//! # Overview
//!
//! A [`Connection`] pairs a working directory and its resolved
//! [`ConnectionParameters`] with a shared [`ProcessExecutionChannel`].
//! Connections are built lazily by a registry and cached for its lifetime.
//!
//! # State
//!
//! Each connection tracks an advisory [`ConnectionState`], starting at
//! `Unknown` and updated from the outcome of the last command:
//!
//! | outcome                  | new state      |
//! |--------------------------|----------------|
//! | completed                | `Connected`    |
//! | refused                  | `NotConnected` |
//! | timeout, spawn, cancel   | unchanged      |
//!
//! The state never blocks a command. Policies such as "go offline after
//! repeated timeouts" belong to callers, which can use
//! [`Connection::set_state`].
//!
//! Commands against one connection are not serialized; concurrent calls
//! run concurrent processes and share no mutable state beyond the state
//! cell.

pub mod manager;
pub mod registry;

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::core::params::{ConnectionParameters, P4Field};
use crate::core::types::{ConnectionId, ConnectionKey, ConnectionState};
use crate::exec::{
    CancellationToken, Cancelled, CommandSpec, ExecOutcome, ExecResult, ProcessExecutionChannel,
};

pub use manager::ConnectionManager;
pub use registry::{ConnectionMapper, ConnectionRegistry, SingletonRegistry};

/// A command to run against a connection.
#[derive(Debug, Clone, Default)]
pub struct CommandRequest {
    pub args: Vec<String>,
    pub stdin: Option<String>,
    /// Overrides the connection's default deadline.
    pub timeout: Option<Duration>,
    /// Extra environment for this command only.
    pub env: Vec<(String, String)>,
}

impl CommandRequest {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }
}

/// Resolved parameters plus a process launcher for one root.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    working_dir: PathBuf,
    params: ConnectionParameters,
    connection_args: Vec<String>,
    channel: Arc<ProcessExecutionChannel>,
    default_timeout: Duration,
    state: AtomicU8,
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Connection {
    /// A connection for a root resolved from config files.
    ///
    /// No connection flags are passed; the client finds the same config
    /// file itself because `PWD` points at the root.
    pub fn for_root(
        root: impl Into<PathBuf>,
        params: ConnectionParameters,
        channel: Arc<ProcessExecutionChannel>,
        default_timeout: Duration,
    ) -> Self {
        let working_dir = root.into();
        Self {
            id: ConnectionId::config(params.config_file_name.as_deref(), working_dir.clone()),
            working_dir,
            params,
            connection_args: Vec::new(),
            channel,
            default_timeout,
            state: AtomicU8::new(ConnectionState::Unknown.to_u8()),
        }
    }

    /// The project-wide connection. Every known field is passed as a flag.
    pub fn singleton(
        working_dir: impl Into<PathBuf>,
        params: ConnectionParameters,
        channel: Arc<ProcessExecutionChannel>,
        default_timeout: Duration,
    ) -> Self {
        let connection_args = P4Field::CONNECTION
            .into_iter()
            .filter_map(|field| Some((field.flag()?, params.get_field(field)?)))
            .flat_map(|(flag, value)| [flag.to_string(), value.to_string()])
            .collect();
        Self {
            id: ConnectionId::Singleton,
            working_dir: working_dir.into(),
            params,
            connection_args,
            channel,
            default_timeout,
            state: AtomicU8::new(ConnectionState::Unknown.to_u8()),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn parameters(&self) -> &ConnectionParameters {
        &self.params
    }

    pub fn key(&self) -> ConnectionKey {
        ConnectionKey::from_params(&self.params)
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: ConnectionState) {
        let previous = self.state.swap(state.to_u8(), Ordering::SeqCst);
        if previous != state.to_u8() {
            debug!(connection = %self.id, %state, "connection state changed");
        }
    }

    /// True unless the last command was refused by the server.
    pub fn is_connected(&self) -> bool {
        self.state() != ConnectionState::NotConnected
    }

    fn spec(&self, request: &CommandRequest) -> CommandSpec {
        let mut env = Vec::with_capacity(request.env.len() + 1);
        if let Some(ignore) = &self.params.ignore_file_name {
            env.push((P4Field::Ignore.env_name().to_string(), ignore.clone()));
        }
        env.extend(request.env.iter().cloned());

        CommandSpec {
            working_dir: self.working_dir.clone(),
            connection_args: self.connection_args.clone(),
            args: request.args.clone(),
            stdin: request.stdin.clone(),
            charset: self.params.charset.clone(),
            env,
            timeout: request.timeout.unwrap_or(self.default_timeout),
        }
    }

    /// Run a command in this connection's working directory.
    ///
    /// # Errors
    ///
    /// Returns `Err(Cancelled)` when `cancel` is raised before or during
    /// the run. Timeouts, refusals and spawn failures are reported inside
    /// the [`ExecResult`].
    pub fn execute(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecResult, Cancelled> {
        let result = self.channel.run(&self.spec(request), cancel)?;
        match result.outcome() {
            ExecOutcome::Completed => self.set_state(ConnectionState::Connected),
            ExecOutcome::Refused => self.set_state(ConnectionState::NotConnected),
            ExecOutcome::TimedOut | ExecOutcome::SpawnFailed | ExecOutcome::Failed => {}
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::env::Environment;

    fn channel() -> Arc<ProcessExecutionChannel> {
        Arc::new(ProcessExecutionChannel::new("p4", Environment::isolated()))
    }

    fn params() -> ConnectionParameters {
        let mut p = ConnectionParameters::default();
        p.set_field(P4Field::Port, "perforce:1666");
        p.set_field(P4Field::User, "alice");
        p.set_field(P4Field::Password, "secret");
        p.set_field(P4Field::Ignore, ".p4ignore");
        p
    }

    #[test]
    fn singleton_passes_known_fields_as_flags() {
        let conn = Connection::singleton("/ws", params(), channel(), Duration::from_secs(1));
        assert_eq!(
            conn.connection_args,
            vec!["-p", "perforce:1666", "-u", "alice", "-P", "secret"]
        );
        assert_eq!(conn.id(), &ConnectionId::Singleton);
    }

    #[test]
    fn root_connection_passes_no_flags() {
        let conn = Connection::for_root("/ws", params(), channel(), Duration::from_secs(1));
        assert!(conn.connection_args.is_empty());
    }

    #[test]
    fn spec_sets_ignore_and_timeout() {
        let conn = Connection::for_root("/ws", params(), channel(), Duration::from_secs(7));
        let spec = conn.spec(&CommandRequest::new(["opened"]).with_env("X", "1"));
        assert_eq!(spec.timeout, Duration::from_secs(7));
        assert_eq!(
            spec.env,
            vec![
                ("P4IGNORE".to_string(), ".p4ignore".to_string()),
                ("X".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn state_starts_unknown() {
        let conn = Connection::for_root("/ws", params(), channel(), Duration::from_secs(1));
        assert_eq!(conn.state(), ConnectionState::Unknown);
        assert!(conn.is_connected());
        conn.set_state(ConnectionState::NotConnected);
        assert!(!conn.is_connected());
    }

    #[test]
    fn equality_follows_id() {
        let a = Connection::for_root("/ws", params(), channel(), Duration::from_secs(1));
        let b = Connection::for_root("/ws", ConnectionParameters::default(), channel(), Duration::from_secs(1));
        let c = Connection::for_root("/other", params(), channel(), Duration::from_secs(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
