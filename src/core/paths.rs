//! core::paths
//!
//! Path normalization, ancestry tests and settings locations.
//!
//! # Architecture
//!
//! Root filtering and longest-prefix lookup compare directories by their
//! components, never by string prefix (`/a/bc` is not under `/a/b`). All
//! paths entering the resolver are first made absolute and lexically
//! normalized with [`normalize`], so that comparisons are stable without
//! touching the filesystem.
//!
//! # Settings Layout
//!
//! Project-scoped settings live under `<project>/.p4conn/`:
//! - `config.toml` - Project settings
//!
//! # Example
//!
//! ```
//! use p4conn::core::paths::{depth, is_ancestor};
//! use std::path::Path;
//!
//! assert!(is_ancestor(Path::new("/a"), Path::new("/a/b/c")));
//! assert!(!is_ancestor(Path::new("/a/b"), Path::new("/a/bc")));
//! assert_eq!(depth(Path::new("/a/b")), 2);
//! ```

use std::path::{Component, Path, PathBuf};

/// Name of the per-project settings directory.
pub const PROJECT_DIR_NAME: &str = ".p4conn";

/// Settings locations for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    /// The project base directory.
    pub base_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `<project>/.p4conn`
    pub fn settings_dir(&self) -> PathBuf {
        self.base_dir.join(PROJECT_DIR_NAME)
    }

    /// `<project>/.p4conn/config.toml`
    pub fn settings_path(&self) -> PathBuf {
        self.settings_dir().join("config.toml")
    }
}

/// Make a path absolute and remove `.` and `..` components lexically.
///
/// Relative paths are resolved against the current directory. Symlinks
/// are not followed.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Number of normal components in a path (`/` is 0, `/a/b` is 2).
pub fn depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

/// True if `ancestor` is `path` or one of its parents.
pub fn is_ancestor_or_self(ancestor: &Path, path: &Path) -> bool {
    path.starts_with(ancestor)
}

/// True if `ancestor` is a strict parent of `path`.
pub fn is_ancestor(ancestor: &Path, path: &Path) -> bool {
    ancestor != path && path.starts_with(ancestor)
}

/// Sort key for root filtering: shallow first, then lexical order.
pub fn depth_then_lexical(a: &Path, b: &Path) -> std::cmp::Ordering {
    depth(a).cmp(&depth(b)).then_with(|| a.cmp(b))
}
