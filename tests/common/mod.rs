//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory tree with config files.
pub struct TestTree {
    dir: TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a relative entry.
    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Create a directory (and its parents).
    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.join(rel);
        fs::create_dir_all(&path).expect("failed to create dir");
        path
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create dir");
        }
        fs::write(&path, contents).expect("failed to write file");
        path
    }

    /// Write `<rel>/.p4config`.
    pub fn p4config(&self, rel: &str, contents: &str) -> PathBuf {
        self.write(&format!("{}/.p4config", rel), contents)
    }

    /// Write an executable shell script standing in for `p4`.
    #[cfg(unix)]
    pub fn fake_p4(&self, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.write("bin/p4", &format!("#!/bin/sh\n{}\n", body));
        let mut perms = fs::metadata(&path).expect("stat script").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod script");
        path
    }
}

/// A fake client that answers `p4 set` and echoes everything else.
pub const PROBING_P4: &str = r#"
if [ "$1" = "set" ]; then
  echo "P4CONFIG=.p4config (set)"
  echo "P4USER=probeuser (set)"
  echo "P4CLIENT=probeclient (enviro)"
  echo "P4PORT=probed:1666 (config '/somewhere/.p4config')"
  exit 0
fi
echo "args: $*"
echo "pwd: $PWD"
echo "ignore: $P4IGNORE"
"#;
