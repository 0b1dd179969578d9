//! core::config
//!
//! Settings schema and loading.
//!
//! # Overview
//!
//! p4conn has two settings scopes:
//! - **Global**: User-level settings
//! - **Project**: Per-project overrides
//!
//! # Precedence
//!
//! Settings values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global settings file
//! 3. Project settings file
//! 4. CLI flags (not handled here)
//!
//! # Global Settings Locations
//!
//! Searched in order:
//! 1. `$P4CONN_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/p4conn/config.toml`
//! 3. `~/.p4conn/config.toml` (canonical write location)
//!
//! # Project Settings Location
//!
//! `<project>/.p4conn/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use p4conn::core::config::Settings;
//! use std::path::Path;
//!
//! let result = Settings::load(Some(Path::new("/path/to/project"))).unwrap();
//! let settings = result.settings;
//!
//! println!("Executable: {}", settings.executable());
//! println!("Timeout: {:?}", settings.server_timeout());
//! ```

pub mod schema;

pub use schema::{ConnectionSettings, SettingsFile};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::params::ConnectionParameters;
use crate::core::paths::ProjectPaths;

/// Default `p4` executable name.
pub const DEFAULT_EXECUTABLE: &str = "p4";

/// Default per-command deadline.
pub const DEFAULT_SERVER_TIMEOUT_MS: u64 = 20_000;

/// Default deadline for the environment probe.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Errors from settings operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write settings file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Result of loading settings.
#[derive(Debug)]
pub struct SettingsLoadResult {
    /// The merged settings.
    pub settings: Settings,
}

/// Merged settings from all scopes.
///
/// Accessors apply precedence automatically: project over global over
/// built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Global settings
    pub global: SettingsFile,
    /// Project settings (if a project path was given)
    pub project: Option<SettingsFile>,
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl Settings {
    /// Build settings from already-parsed scopes (no files involved).
    pub fn from_files(global: SettingsFile, project: Option<SettingsFile>) -> Self {
        Self {
            global,
            project,
            global_path: None,
            project_path: None,
        }
    }

    /// Load settings from default locations.
    ///
    /// If `project_dir` is provided, also loads project settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be parsed or
    /// holds invalid values. Missing files are not an error.
    pub fn load(project_dir: Option<&Path>) -> Result<SettingsLoadResult, ConfigError> {
        let (global, global_path) = Self::load_global()?;

        let (project, project_path) = match project_dir {
            Some(dir) => {
                let path = ProjectPaths::new(dir).settings_path();
                if path.exists() {
                    (Some(Self::read_file(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        Ok(SettingsLoadResult {
            settings: Settings {
                global,
                project,
                global_path,
                project_path,
            },
        })
    }

    fn load_global() -> Result<(SettingsFile, Option<PathBuf>), ConfigError> {
        if let Ok(path) = std::env::var("P4CONN_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok((Self::read_file(&path)?, Some(path)));
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("p4conn/config.toml");
            if path.exists() {
                return Ok((Self::read_file(&path)?, Some(path)));
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".p4conn/config.toml");
            if path.exists() {
                return Ok((Self::read_file(&path)?, Some(path)));
            }
        }

        Ok((SettingsFile::default(), None))
    }

    fn read_file(path: &Path) -> Result<SettingsFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write project settings atomically.
    ///
    /// Creates `<project>/.p4conn/` if needed.
    pub fn write_project(project_dir: &Path, file: &SettingsFile) -> Result<PathBuf, ConfigError> {
        file.validate()?;
        let path = ProjectPaths::new(project_dir).settings_path();
        Self::write_atomic(&path, file)?;
        Ok(path)
    }

    fn write_atomic(path: &Path, file: &SettingsFile) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(file).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut out = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;
        out.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;
        out.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    fn pick<T: Clone>(&self, get: impl Fn(&SettingsFile) -> Option<T>) -> Option<T> {
        self.project
            .as_ref()
            .and_then(&get)
            .or_else(|| get(&self.global))
    }

    /// The `p4` executable. Defaults to `p4` (looked up on `PATH`).
    pub fn executable(&self) -> String {
        self.pick(|f| f.executable.clone())
            .unwrap_or_else(|| DEFAULT_EXECUTABLE.to_string())
    }

    /// Per-command deadline. Defaults to 20 seconds.
    pub fn server_timeout(&self) -> Duration {
        Duration::from_millis(
            self.pick(|f| f.server_timeout_ms)
                .unwrap_or(DEFAULT_SERVER_TIMEOUT_MS),
        )
    }

    /// Deadline for `p4 set`. Defaults to 5 seconds.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(
            self.pick(|f| f.probe_timeout_ms)
                .unwrap_or(DEFAULT_PROBE_TIMEOUT_MS),
        )
    }

    /// Whether connections are resolved per directory. Defaults to `true`.
    pub fn use_p4config(&self) -> bool {
        self.pick(|f| f.use_p4config).unwrap_or(true)
    }

    /// Whether to run the environment probe. Defaults to `true`.
    pub fn probe_environment(&self) -> bool {
        self.pick(|f| f.probe_environment).unwrap_or(true)
    }

    /// Config file name override. `None` means "use P4CONFIG".
    pub fn config_file_name(&self) -> Option<String> {
        self.pick(|f| f.config_file_name.clone())
    }

    /// Ignore file name override. `None` means "use P4IGNORE".
    pub fn ignore_file_name(&self) -> Option<String> {
        self.pick(|f| f.ignore_file_name.clone())
    }

    /// Program tag for `-zprog`. `None` disables the flag.
    pub fn program_tag(&self) -> Option<String> {
        self.pick(|f| f.program_tag.clone())
    }

    /// Fixed connection parameters for single-connection mode.
    ///
    /// Each field is taken from the project scope if set there, otherwise
    /// from the global scope.
    pub fn fixed_connection(&self) -> ConnectionParameters {
        let conn = |get: fn(&ConnectionSettings) -> Option<String>| {
            self.pick(|f| f.connection.as_ref().and_then(get))
        };
        let mut params = ConnectionParameters::default();
        params.server = conn(|c| c.port.clone());
        params.client = conn(|c| c.client.clone());
        params.user = conn(|c| c.user.clone());
        params.password = conn(|c| c.password.clone());
        params.charset = conn(|c| c.charset.clone());
        params.config_file_name = self.config_file_name();
        params.ignore_file_name = self.ignore_file_name();
        params
    }

    /// Path of the loaded global settings file.
    pub fn global_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Path of the loaded project settings file.
    pub fn project_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}
