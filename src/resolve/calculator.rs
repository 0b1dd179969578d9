//! resolve::calculator
//!
//! Computing the root -> parameters mapping for a project.
//!
//! # Overview
//!
//! Given the version-controlled roots of a project:
//!
//! 1. Probe the client once for project-wide defaults (optional)
//! 2. Pick the config file name: explicit setting, then the probe's
//!    `P4CONFIG`, then the `P4CONFIG` environment variable
//! 3. Find the config directory that owns each root
//! 4. Resolve parameters once per config directory: stacked config files
//!    (nearest wins), then probe defaults, then raw environment variables
//! 5. Drop redundant roots in two passes (see [`filter_roots`])
//!
//! The result is a frozen [`MultipleConnections`].
//!
//! # Filtering
//!
//! Both passes sort the roots by depth, then lexically, and scan once,
//! comparing each root against its nearest kept ancestor only:
//!
//! - Pass A drops a root whose nearest kept ancestor has the same config
//!   directory
//! - Pass B drops a root whose nearest kept ancestor has equal identity
//!   parameters, when neither carries a warning or fatal error
//!
//! A farther ancestor never absorbs a root: with `/a` and `/a/b/c` on one
//! server and `/a/b` on another, files under `/a/b/c` would otherwise be
//! routed to `/a/b`.
//!
//! Per-root errors stay attached to the root; they never abort the pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::locator::ConfigFileLocator;
use super::parser::read_stacked;
use super::probe::EnvironmentProbe;
use crate::core::env::Environment;
use crate::core::params::{ConnectionParameters, P4Field};
use crate::core::paths::{depth_then_lexical, is_ancestor, is_ancestor_or_self, normalize};
use crate::exec::{CancellationToken, Cancelled};

/// One candidate root during filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RootEntry {
    pub root: PathBuf,
    /// Directory holding the nearest config file, if any.
    pub config_dir: Option<PathBuf>,
    pub params: ConnectionParameters,
}

fn sorted(mut entries: Vec<RootEntry>) -> Vec<RootEntry> {
    entries.sort_by(|a, b| depth_then_lexical(&a.root, &b.root));
    entries
}

fn scan(
    entries: Vec<RootEntry>,
    redundant: impl Fn(&RootEntry, &RootEntry) -> bool,
) -> Vec<RootEntry> {
    let mut kept: Vec<RootEntry> = Vec::with_capacity(entries.len());
    for candidate in sorted(entries) {
        // `kept` is ordered by depth, so the last ancestor found is the
        // nearest one, which is the root that would own the candidate's files
        let covered = kept
            .iter()
            .rev()
            .find(|outer| is_ancestor(&outer.root, &candidate.root))
            .filter(|&outer| redundant(outer, &candidate))
            .map(|outer| outer.root.clone());
        match covered {
            Some(outer) => debug!(
                root = %candidate.root.display(),
                merged_into = %outer.display(),
                "dropping redundant root"
            ),
            None => kept.push(candidate),
        }
    }
    kept
}

/// Pass A: drop descendants that share the config directory of their
/// nearest kept ancestor.
pub fn filter_by_config_dir(entries: Vec<RootEntry>) -> Vec<RootEntry> {
    scan(entries, |outer, inner| outer.config_dir == inner.config_dir)
}

/// Pass B: drop descendants whose parameters equal those of their nearest
/// kept ancestor.
pub fn filter_by_parameters(entries: Vec<RootEntry>) -> Vec<RootEntry> {
    scan(entries, |outer, inner| {
        !outer.params.has_problems() && !inner.params.has_problems() && outer.params == inner.params
    })
}

/// Both passes, in order.
pub fn filter_roots(entries: Vec<RootEntry>) -> Vec<RootEntry> {
    filter_by_parameters(filter_by_config_dir(entries))
}

/// The frozen result of a resolution pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MultipleConnections {
    roots: BTreeMap<PathBuf, ConnectionParameters>,
    config_dirs: BTreeMap<PathBuf, Option<PathBuf>>,
    defaults: ConnectionParameters,
    config_file_name: Option<String>,
    ignore_file_name: Option<String>,
}

impl MultipleConnections {
    fn from_entries(
        entries: Vec<RootEntry>,
        defaults: ConnectionParameters,
        config_file_name: Option<String>,
        ignore_file_name: Option<String>,
    ) -> Self {
        let mut roots = BTreeMap::new();
        let mut config_dirs = BTreeMap::new();
        for entry in entries {
            config_dirs.insert(entry.root.clone(), entry.config_dir);
            roots.insert(entry.root, entry.params);
        }
        Self {
            roots,
            config_dirs,
            defaults,
            config_file_name,
            ignore_file_name,
        }
    }

    /// Surviving roots and their parameters, in path order.
    pub fn roots(&self) -> &BTreeMap<PathBuf, ConnectionParameters> {
        &self.roots
    }

    pub fn parameters(&self, root: &Path) -> Option<&ConnectionParameters> {
        self.roots.get(root)
    }

    /// Config directory owning `root`. `None` when the root has none.
    pub fn config_dir(&self, root: &Path) -> Option<&Path> {
        self.config_dirs.get(root).and_then(|d| d.as_deref())
    }

    /// Project-wide defaults learned from the probe.
    pub fn defaults(&self) -> &ConnectionParameters {
        &self.defaults
    }

    /// The config file name used for this pass.
    pub fn config_file_name(&self) -> Option<&str> {
        self.config_file_name.as_deref()
    }

    pub fn ignore_file_name(&self) -> Option<&str> {
        self.ignore_file_name.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// The deepest root that is `file` or one of its ancestors.
    pub fn root_for(&self, file: &Path) -> Option<&Path> {
        let file = normalize(file);
        // BTreeMap order puts every ancestor before its descendants
        self.roots
            .keys()
            .rev()
            .find(|root| is_ancestor_or_self(root, &file))
            .map(PathBuf::as_path)
    }
}

/// Resolves the parameters of every root in a project.
#[derive(Debug, Clone)]
pub struct ConnectionCalculator {
    config_file_name: Option<String>,
    ignore_file_name: Option<String>,
    environment: Environment,
    probe: Option<EnvironmentProbe>,
    probe_dir: PathBuf,
}

impl ConnectionCalculator {
    pub fn new(environment: Environment, probe_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_file_name: None,
            ignore_file_name: None,
            environment,
            probe: None,
            probe_dir: probe_dir.into(),
        }
    }

    /// Use this config file name instead of asking the client.
    pub fn with_config_file_name(mut self, name: Option<String>) -> Self {
        self.config_file_name = name;
        self
    }

    pub fn with_ignore_file_name(mut self, name: Option<String>) -> Self {
        self.ignore_file_name = name;
        self
    }

    /// Probe the client for defaults before resolving.
    pub fn with_probe(mut self, probe: Option<EnvironmentProbe>) -> Self {
        self.probe = probe;
        self
    }

    fn env_fallback(&self, params: &mut ConnectionParameters) {
        params.fill_missing_with(|field| self.environment.var(field.env_name()));
    }

    fn resolve_dir(
        &self,
        locator: &mut ConfigFileLocator,
        config_dir: &Path,
        defaults: &ConnectionParameters,
    ) -> ConnectionParameters {
        let files = locator.config_files_along(config_dir);
        let mut params = read_stacked(&files);
        params.fill_missing_from(defaults);
        self.env_fallback(&mut params);
        params
    }

    fn no_config(
        &self,
        config_file_name: Option<&str>,
        defaults: &ConnectionParameters,
    ) -> ConnectionParameters {
        let mut params = ConnectionParameters::no_config_found(config_file_name);
        params.fill_missing_from(defaults);
        self.env_fallback(&mut params);
        params
    }

    /// Resolve `roots` into a frozen mapping.
    ///
    /// # Errors
    ///
    /// Only cancellation of the probe is an error. Problems with single
    /// roots are recorded on their parameters.
    pub fn calculate(
        &self,
        roots: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<MultipleConnections, Cancelled> {
        let defaults = match &self.probe {
            Some(probe) => probe.probe(&self.probe_dir, cancel)?.defaults,
            None => ConnectionParameters::default(),
        };

        let config_file_name = self
            .config_file_name
            .clone()
            .or_else(|| defaults.get_field(P4Field::Config).map(str::to_string))
            .or_else(|| self.environment.var(P4Field::Config.env_name()));
        let ignore_file_name = self
            .ignore_file_name
            .clone()
            .or_else(|| defaults.get_field(P4Field::Ignore).map(str::to_string))
            .or_else(|| self.environment.var(P4Field::Ignore.env_name()));

        let roots: BTreeSet<PathBuf> = roots.iter().map(|r| normalize(r)).collect();
        let mut by_dir: HashMap<Option<PathBuf>, ConnectionParameters> = HashMap::new();
        let mut entries = Vec::with_capacity(roots.len());

        match config_file_name.as_deref() {
            Some(name) => {
                let mut locator = ConfigFileLocator::new(name);
                for root in roots {
                    cancel.check()?;
                    let config_dir = locator.find_config_dir(&root);
                    let params = match by_dir.get(&config_dir) {
                        Some(params) => params.clone(),
                        None => {
                            let params = match &config_dir {
                                Some(dir) => self.resolve_dir(&mut locator, dir, &defaults),
                                None => self.no_config(Some(name), &defaults),
                            };
                            by_dir.insert(config_dir.clone(), params.clone());
                            params
                        }
                    };
                    entries.push(RootEntry {
                        root,
                        config_dir,
                        params,
                    });
                }
            }
            None => {
                let params = self.no_config(None, &defaults);
                entries.extend(roots.into_iter().map(|root| RootEntry {
                    root,
                    config_dir: None,
                    params: params.clone(),
                }));
            }
        }

        for entry in &mut entries {
            entry.params.config_file_name = config_file_name.clone();
            entry.params.ignore_file_name = ignore_file_name.clone();
        }

        let candidates = entries.len();
        let kept = filter_roots(entries);
        info!(
            candidates,
            kept = kept.len(),
            config_file = ?config_file_name,
            "resolved connections"
        );

        Ok(MultipleConnections::from_entries(
            kept,
            defaults,
            config_file_name,
            ignore_file_name,
        ))
    }
}
