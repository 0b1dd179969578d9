//! connection::manager
//!
//! Project-level entry point: owns settings and roots, chooses the
//! mapping strategy and keeps the result until it is invalidated.
//!
//! # Lifecycle
//!
//! The mapper is built on first use and memoized. It is dropped, and so
//! rebuilt on the next request, when:
//! - [`ConnectionManager::update_connections`] is called
//! - the roots change ([`ConnectionManager::set_roots`])
//! - a config or ignore file is created, changed or deleted
//!   ([`ConnectionManager::on_file_changed`])
//!
//! A manager is created by the caller that wires the application together
//! and handed to consumers. There is no global instance.
//!
//! # Example
//!
//! ```no_run
//! use p4conn::connection::{CommandRequest, ConnectionManager};
//! use p4conn::core::config::Settings;
//! use p4conn::core::env::Environment;
//! use p4conn::exec::CancellationToken;
//! use std::path::{Path, PathBuf};
//!
//! let project = PathBuf::from("/ws");
//! let settings = Settings::load(Some(&project)).unwrap().settings;
//! let manager = ConnectionManager::from_settings(
//!     settings,
//!     project.clone(),
//!     vec![project.clone()],
//!     Environment::inherited(),
//! );
//!
//! let cancel = CancellationToken::new();
//! if let Some(conn) = manager.connection_for(Path::new("/ws/src/main.c"), &cancel).unwrap() {
//!     let result = conn.execute(&CommandRequest::new(["info"]), &cancel).unwrap();
//!     println!("{}", result.stdout);
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use super::registry::{ConnectionMapper, ConnectionRegistry, SingletonRegistry};
use super::Connection;
use crate::core::config::Settings;
use crate::core::env::Environment;
use crate::core::params::P4Field;
use crate::core::paths::{is_ancestor_or_self, normalize};
use crate::core::types::ConnectionKey;
use crate::exec::{CancellationToken, Cancelled, ProcessExecutionChannel};
use crate::resolve::{ConnectionCalculator, EnvironmentProbe};

/// Owns the connection mapping of one project.
#[derive(Debug)]
pub struct ConnectionManager {
    settings: Settings,
    project_dir: PathBuf,
    roots: RwLock<Vec<PathBuf>>,
    channel: Arc<ProcessExecutionChannel>,
    mapper: RwLock<Option<Arc<ConnectionMapper>>>,
    /// Bumped on every invalidation, under the `mapper` write lock.
    generation: AtomicU64,
    build: Mutex<()>,
}

/// Build the execution channel described by `settings`.
pub fn channel_from_settings(settings: &Settings, environment: Environment) -> ProcessExecutionChannel {
    ProcessExecutionChannel::new(settings.executable(), environment)
        .with_program_tag(settings.program_tag())
}

impl ConnectionManager {
    pub fn new(
        settings: Settings,
        project_dir: PathBuf,
        roots: Vec<PathBuf>,
        channel: ProcessExecutionChannel,
    ) -> Self {
        Self {
            settings,
            project_dir: normalize(&project_dir),
            roots: RwLock::new(roots),
            channel: Arc::new(channel),
            mapper: RwLock::new(None),
            generation: AtomicU64::new(0),
            build: Mutex::new(()),
        }
    }

    /// Manager with the channel configured from `settings`.
    pub fn from_settings(
        settings: Settings,
        project_dir: PathBuf,
        roots: Vec<PathBuf>,
        environment: Environment,
    ) -> Self {
        let channel = channel_from_settings(&settings, environment);
        Self::new(settings, project_dir, roots, channel)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cached(&self) -> Option<Arc<ConnectionMapper>> {
        self.mapper
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The memoized mapper, built if needed.
    ///
    /// A mapper whose build overlapped an invalidation is discarded and
    /// built again, so it never outlives the roots it was built from.
    ///
    /// # Errors
    ///
    /// Returns `Err(Cancelled)` if `cancel` is raised while probing.
    pub fn mapper(&self, cancel: &CancellationToken) -> Result<Arc<ConnectionMapper>, Cancelled> {
        if let Some(mapper) = self.cached() {
            return Ok(mapper);
        }

        let _building = self.build.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mapper) = self.cached() {
            return Ok(mapper);
        }

        loop {
            let generation = self.generation.load(Ordering::SeqCst);
            let mapper = Arc::new(self.build_mapper(cancel)?);

            let mut slot = self.mapper.write().unwrap_or_else(PoisonError::into_inner);
            if self.generation.load(Ordering::SeqCst) == generation {
                *slot = Some(Arc::clone(&mapper));
                return Ok(mapper);
            }
            debug!("connections invalidated during resolution, resolving again");
        }
    }

    fn build_mapper(&self, cancel: &CancellationToken) -> Result<ConnectionMapper, Cancelled> {
        let timeout = self.settings.server_timeout();

        if !self.settings.use_p4config() {
            debug!("using a single project connection");
            let connection = Connection::singleton(
                self.project_dir.clone(),
                self.settings.fixed_connection(),
                Arc::clone(&self.channel),
                timeout,
            );
            return Ok(ConnectionMapper::Singleton(SingletonRegistry::new(connection)));
        }

        let probe = self
            .settings
            .probe_environment()
            .then(|| EnvironmentProbe::new(Arc::clone(&self.channel), self.settings.probe_timeout()));
        let mapping = ConnectionCalculator::new(self.channel.environment().clone(), &self.project_dir)
            .with_config_file_name(self.settings.config_file_name())
            .with_ignore_file_name(self.settings.ignore_file_name())
            .with_probe(probe)
            .calculate(&self.roots(), cancel)?;

        Ok(ConnectionMapper::Multiple(ConnectionRegistry::new(
            mapping,
            Arc::clone(&self.channel),
            timeout,
        )))
    }

    /// The connection owning `file`.
    pub fn connection_for(
        &self,
        file: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<Connection>>, Cancelled> {
        Ok(self.mapper(cancel)?.resolve(file))
    }

    /// Every connection of the project, keyed by working directory.
    pub fn all_connections(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<PathBuf, Arc<Connection>>, Cancelled> {
        Ok(self.mapper(cancel)?.all_connections())
    }

    /// Drop the memoized mapper. The next request re-resolves everything.
    pub fn update_connections(&self) {
        let dropped = {
            let mut slot = self.mapper.write().unwrap_or_else(PoisonError::into_inner);
            self.generation.fetch_add(1, Ordering::SeqCst);
            slot.take()
        };
        if dropped.is_some() {
            info!("connections invalidated");
        }
    }

    /// Replace the project roots and invalidate.
    pub fn set_roots(&self, roots: Vec<PathBuf>) {
        *self.roots.write().unwrap_or_else(PoisonError::into_inner) = roots;
        self.update_connections();
    }

    fn watched_file_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(mapping) = self.cached().as_deref().and_then(ConnectionMapper::mapping) {
            names.extend(mapping.config_file_name().map(str::to_string));
            names.extend(mapping.ignore_file_name().map(str::to_string));
        }
        names.extend(self.settings.config_file_name());
        names.extend(self.settings.ignore_file_name());
        let env = self.channel.environment();
        names.extend(env.var(P4Field::Config.env_name()));
        names.extend(env.var(P4Field::Ignore.env_name()));
        names
    }

    /// React to a created, changed or deleted file.
    ///
    /// Returns true if the file is a config or ignore file and the
    /// connections were invalidated.
    pub fn on_file_changed(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !self.watched_file_names().iter().any(|watched| watched == name) {
            return false;
        }
        debug!(path = %path.display(), "connection settings file changed");
        self.update_connections();
        true
    }

    /// True if `file` lies under one of the project roots.
    pub fn is_under_project_connections(&self, file: &Path) -> bool {
        let file = normalize(file);
        self.roots()
            .iter()
            .any(|root| is_ancestor_or_self(&normalize(root), &file))
    }

    /// Roots grouped by the server identity they talk to.
    pub fn connection_keys(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<ConnectionKey, Vec<PathBuf>>, Cancelled> {
        let mut keys: BTreeMap<ConnectionKey, Vec<PathBuf>> = BTreeMap::new();
        for (root, conn) in self.all_connections(cancel)? {
            keys.entry(conn.key()).or_default().push(root);
        }
        Ok(keys)
    }
}
