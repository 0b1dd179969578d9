//! core::env
//!
//! Environment variable lookup with injectable overrides.
//!
//! # Design
//!
//! Resolution falls back to `P4*` environment variables, and every spawned
//! `p4` process receives an environment overlay. Both read through an
//! [`Environment`] value that is handed to the resolver and to the execution
//! channel at construction time. There is no process-wide override table:
//! tests build an `Environment` with their own overrides and, usually,
//! with inheritance of the real process environment turned off.
//!
//! # Example
//!
//! ```
//! use p4conn::core::env::Environment;
//!
//! let env = Environment::isolated().with_override("P4PORT", "ssl:perforce:1666");
//! assert_eq!(env.var("P4PORT").as_deref(), Some("ssl:perforce:1666"));
//! assert_eq!(env.var("P4USER"), None);
//! ```

use std::collections::BTreeMap;

/// Source of environment variables for resolution and process spawning.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Values that shadow the process environment and are exported to
    /// every spawned client process.
    overrides: BTreeMap<String, String>,
    /// Whether lookups fall through to the real process environment.
    inherit: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self::inherited()
    }
}

impl Environment {
    /// The production environment: no overrides, reads the process env.
    pub fn inherited() -> Self {
        Self {
            overrides: BTreeMap::new(),
            inherit: true,
        }
    }

    /// An environment that only sees its own overrides.
    ///
    /// Spawned processes still inherit the parent environment (so `PATH`
    /// keeps working); only lookups made by the resolver are isolated.
    pub fn isolated() -> Self {
        Self {
            overrides: BTreeMap::new(),
            inherit: false,
        }
    }

    /// Add an override, replacing any previous value for `name`.
    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Look up a variable. Overrides win over the process environment.
    ///
    /// Empty values are treated as unset.
    pub fn var(&self, name: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(name) {
            return non_empty(value.clone());
        }
        if self.inherit {
            return std::env::var(name).ok().and_then(non_empty);
        }
        None
    }

    /// The overrides to overlay onto a spawned process environment.
    pub fn overrides(&self) -> &BTreeMap<String, String> {
        &self.overrides
    }

    /// Whether lookups fall through to the process environment.
    pub fn inherits(&self) -> bool {
        self.inherit
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
