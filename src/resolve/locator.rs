//! resolve::locator
//!
//! Upward search for the directory that owns a config file.
//!
//! # Caching
//!
//! Every directory visited during a walk is memoized with its answer
//! (the owning config directory, or "none"). A later walk stops at the
//! first memoized directory, so each directory is stat'ed at most once per
//! locator. The cache never expires: create a fresh locator for every
//! resolution pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::core::paths::normalize;

/// Finds the nearest ancestor (inclusive) holding a named config file.
#[derive(Debug)]
pub struct ConfigFileLocator {
    config_file_name: String,
    memo: HashMap<PathBuf, Option<PathBuf>>,
    probes: usize,
}

impl ConfigFileLocator {
    pub fn new(config_file_name: impl Into<String>) -> Self {
        Self {
            config_file_name: config_file_name.into(),
            memo: HashMap::new(),
            probes: 0,
        }
    }

    /// The file name being searched for.
    pub fn config_file_name(&self) -> &str {
        &self.config_file_name
    }

    /// Number of filesystem checks performed so far.
    pub fn filesystem_probes(&self) -> usize {
        self.probes
    }

    /// Find the nearest directory at or above `start` that contains a
    /// regular file named after the config file.
    pub fn find_config_dir(&mut self, start: &Path) -> Option<PathBuf> {
        let start = normalize(start);
        let mut walked = Vec::new();
        let mut current = Some(start.as_path());

        let found = loop {
            let Some(dir) = current else {
                break None;
            };
            if let Some(known) = self.memo.get(dir) {
                break known.clone();
            }
            walked.push(dir.to_path_buf());
            self.probes += 1;
            if dir.join(&self.config_file_name).is_file() {
                break Some(dir.to_path_buf());
            }
            current = dir.parent();
        };

        trace!(
            start = %start.display(),
            found = ?found,
            walked = walked.len(),
            "config dir lookup"
        );

        for dir in walked {
            self.memo.insert(dir, found.clone());
        }
        found
    }

    /// Every config file on the ancestor chain of `start`, nearest first.
    pub fn config_files_along(&mut self, start: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut next = Some(normalize(start));
        while let Some(dir) = next {
            match self.find_config_dir(&dir) {
                Some(config_dir) => {
                    files.push(config_dir.join(&self.config_file_name));
                    next = config_dir.parent().map(Path::to_path_buf);
                }
                None => break,
            }
        }
        files
    }
}
