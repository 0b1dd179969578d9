//! connection::registry
//!
//! Mapping files to cached connections.
//!
//! # Design
//!
//! [`ConnectionRegistry`] serves the per-directory mode. It holds a frozen
//! [`MultipleConnections`] and builds at most one [`Connection`] per root,
//! on first use. The cache sits behind one registry-wide `RwLock`: lookups
//! that hit take only the read lock; a miss takes the write lock and checks
//! again before building, so concurrent first requests for a root share a
//! single instance.
//!
//! [`SingletonRegistry`] serves the single-connection mode: every file maps
//! to the same connection.
//!
//! [`ConnectionMapper`] is the choice between the two, made once by the
//! [`ConnectionManager`](super::ConnectionManager).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::trace;

use super::Connection;
use crate::exec::ProcessExecutionChannel;
use crate::resolve::MultipleConnections;

/// Lazily built connections for the roots of a resolution pass.
#[derive(Debug)]
pub struct ConnectionRegistry {
    mapping: Arc<MultipleConnections>,
    channel: Arc<ProcessExecutionChannel>,
    timeout: Duration,
    cache: RwLock<HashMap<PathBuf, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new(
        mapping: MultipleConnections,
        channel: Arc<ProcessExecutionChannel>,
        timeout: Duration,
    ) -> Self {
        Self {
            mapping: Arc::new(mapping),
            channel,
            timeout,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn mapping(&self) -> &MultipleConnections {
        &self.mapping
    }

    /// The connection of the deepest root covering `file`.
    pub fn connection_for(&self, file: &Path) -> Option<Arc<Connection>> {
        let root = self.mapping.root_for(file)?;
        self.connection_for_root(root)
    }

    /// The connection for an exact root of the mapping.
    pub fn connection_for_root(&self, root: &Path) -> Option<Arc<Connection>> {
        if let Some(conn) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(root)
        {
            return Some(Arc::clone(conn));
        }

        let params = self.mapping.parameters(root)?;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let conn = cache.entry(root.to_path_buf()).or_insert_with(|| {
            trace!(root = %root.display(), "building connection");
            Arc::new(Connection::for_root(
                root,
                params.clone(),
                Arc::clone(&self.channel),
                self.timeout,
            ))
        });
        Some(Arc::clone(conn))
    }

    /// Build (or fetch) the connection of every root.
    pub fn all_connections(&self) -> BTreeMap<PathBuf, Arc<Connection>> {
        self.mapping
            .roots()
            .keys()
            .filter_map(|root| Some((root.clone(), self.connection_for_root(root)?)))
            .collect()
    }
}

/// One connection shared by every file.
#[derive(Debug, Clone)]
pub struct SingletonRegistry {
    connection: Arc<Connection>,
}

impl SingletonRegistry {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection: Arc::new(connection),
        }
    }

    pub fn connection(&self) -> Arc<Connection> {
        Arc::clone(&self.connection)
    }
}

/// The connection mapping strategy chosen for a project.
#[derive(Debug)]
pub enum ConnectionMapper {
    Singleton(SingletonRegistry),
    Multiple(ConnectionRegistry),
}

impl ConnectionMapper {
    /// The connection that owns `file`, if any.
    pub fn resolve(&self, file: &Path) -> Option<Arc<Connection>> {
        match self {
            ConnectionMapper::Singleton(registry) => Some(registry.connection()),
            ConnectionMapper::Multiple(registry) => registry.connection_for(file),
        }
    }

    /// Every connection, keyed by working directory.
    pub fn all_connections(&self) -> BTreeMap<PathBuf, Arc<Connection>> {
        match self {
            ConnectionMapper::Singleton(registry) => {
                let conn = registry.connection();
                BTreeMap::from([(conn.working_dir().to_path_buf(), conn)])
            }
            ConnectionMapper::Multiple(registry) => registry.all_connections(),
        }
    }

    /// The resolution result, in per-directory mode.
    pub fn mapping(&self) -> Option<&MultipleConnections> {
        match self {
            ConnectionMapper::Singleton(_) => None,
            ConnectionMapper::Multiple(registry) => Some(registry.mapping()),
        }
    }
}
