//! core::config::schema
//!
//! Settings schema types.
//!
//! # Scopes
//!
//! The same schema is used for the global file and the project file. Every
//! field is optional; unset fields fall through to the other scope and
//! finally to built-in defaults.
//!
//! # Validation
//!
//! Values are validated after parsing (e.g., timeouts must be positive).

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Settings file contents (either scope).
///
/// # Example
///
/// ```toml
/// executable = "/usr/local/bin/p4"
/// server_timeout_ms = 20000
/// use_p4config = true
/// config_file_name = ".p4config"
///
/// [connection]
/// port = "ssl:perforce:1666"
/// user = "alice"
/// client = "alice-main"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    /// Path or name of the `p4` executable
    pub executable: Option<String>,

    /// Hard deadline for each client command, in milliseconds
    pub server_timeout_ms: Option<u64>,

    /// Deadline for the `p4 set` environment probe, in milliseconds
    pub probe_timeout_ms: Option<u64>,

    /// Resolve connections per directory from config files
    pub use_p4config: Option<bool>,

    /// Run `p4 set` to learn environment defaults
    pub probe_environment: Option<bool>,

    /// Config file name to search for (overrides P4CONFIG)
    pub config_file_name: Option<String>,

    /// Ignore file name exported as P4IGNORE
    pub ignore_file_name: Option<String>,

    /// Program tag sent with `-zprog`
    pub program_tag: Option<String>,

    /// Fixed connection used when `use_p4config` is false
    pub connection: Option<ConnectionSettings>,
}

impl SettingsFile {
    /// Validate the settings values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "server_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.probe_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "probe_timeout_ms must be greater than zero".into(),
            ));
        }
        if let Some(exe) = &self.executable {
            if exe.trim().is_empty() {
                return Err(ConfigError::InvalidValue("executable cannot be empty".into()));
            }
        }
        for (key, name) in [
            ("config_file_name", &self.config_file_name),
            ("ignore_file_name", &self.ignore_file_name),
        ] {
            if let Some(name) = name {
                if name.is_empty() || name.contains('/') || name.contains('\\') {
                    return Err(ConfigError::InvalidValue(format!(
                        "{} must be a plain file name, got '{}'",
                        key, name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Fixed connection parameters for the single-connection mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSettings {
    pub port: Option<String>,
    pub client: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub charset: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_file() {
        let toml = r#"
            executable = "p4"
            server_timeout_ms = 1000
            use_p4config = false

            [connection]
            port = "perforce:1666"
            user = "bob"
        "#;
        let parsed: SettingsFile = toml::from_str(toml).unwrap();
        assert_eq!(parsed.server_timeout_ms, Some(1000));
        assert_eq!(parsed.use_p4config, Some(false));
        let conn = parsed.connection.unwrap();
        assert_eq!(conn.port.as_deref(), Some("perforce:1666"));
        assert!(conn.client.is_none());
    }

    #[test]
    fn zero_timeout_rejected() {
        let parsed = SettingsFile {
            server_timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn config_name_with_separator_rejected() {
        let parsed = SettingsFile {
            config_file_name: Some("dir/.p4config".into()),
            ..Default::default()
        };
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<SettingsFile, _> = toml::from_str("bogus = 1");
        assert!(result.is_err());
    }
}
