//! config command - Get, set, or list settings values

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::core::config::{ConnectionSettings, Settings, SettingsFile};
use crate::ui::output;

/// Every settings key, in display order.
const KEYS: [&str; 13] = [
    "executable",
    "server_timeout_ms",
    "probe_timeout_ms",
    "use_p4config",
    "probe_environment",
    "config_file_name",
    "ignore_file_name",
    "program_tag",
    "connection.port",
    "connection.client",
    "connection.user",
    "connection.password",
    "connection.charset",
];

fn effective(settings: &Settings, key: &str) -> Result<Option<String>> {
    let fixed = settings.fixed_connection();
    let value = match key {
        "executable" => Some(settings.executable()),
        "server_timeout_ms" => Some(settings.server_timeout().as_millis().to_string()),
        "probe_timeout_ms" => Some(settings.probe_timeout().as_millis().to_string()),
        "use_p4config" => Some(settings.use_p4config().to_string()),
        "probe_environment" => Some(settings.probe_environment().to_string()),
        "config_file_name" => settings.config_file_name(),
        "ignore_file_name" => settings.ignore_file_name(),
        "program_tag" => settings.program_tag(),
        "connection.port" => fixed.server,
        "connection.client" => fixed.client,
        "connection.user" => fixed.user,
        "connection.password" => fixed.password,
        "connection.charset" => fixed.charset,
        _ => bail!("Unknown configuration key: {}", key),
    };
    Ok(value)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => bail!("{} expects true or false, got '{}'", key, value),
    }
}

fn parse_ms(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("{} expects milliseconds, got '{}'", key, value))
}

/// Apply `key = value` to a settings file.
fn apply(file: &mut SettingsFile, key: &str, value: &str) -> Result<()> {
    let text = Some(value.to_string());
    match key {
        "executable" => file.executable = text,
        "server_timeout_ms" => file.server_timeout_ms = Some(parse_ms(key, value)?),
        "probe_timeout_ms" => file.probe_timeout_ms = Some(parse_ms(key, value)?),
        "use_p4config" => file.use_p4config = Some(parse_bool(key, value)?),
        "probe_environment" => file.probe_environment = Some(parse_bool(key, value)?),
        "config_file_name" => file.config_file_name = text,
        "ignore_file_name" => file.ignore_file_name = text,
        "program_tag" => file.program_tag = text,
        _ => {
            let Some(field) = key.strip_prefix("connection.") else {
                bail!("Unknown configuration key: {}", key);
            };
            let conn = file.connection.get_or_insert_with(ConnectionSettings::default);
            match field {
                "port" => conn.port = text,
                "client" => conn.client = text,
                "user" => conn.user = text,
                "password" => conn.password = text,
                "charset" => conn.charset = text,
                _ => bail!("Unknown configuration key: {}", key),
            }
        }
    }
    Ok(())
}

/// Get an effective settings value.
pub fn get(ctx: &Context, key: &str) -> Result<i32> {
    let settings = ctx.load_settings()?;
    if let Some(value) = effective(&settings, key)? {
        println!("{}", value);
    }
    Ok(0)
}

/// Set a value in the project settings file.
pub fn set(ctx: &Context, key: &str, value: &str) -> Result<i32> {
    let project_dir = ctx.project_dir()?;
    let settings = ctx.load_settings()?;
    let mut file = settings.project.unwrap_or_default();
    apply(&mut file, key, value)?;

    let path = Settings::write_project(&project_dir, &file).context("Failed to write settings")?;
    output::debug(format!("wrote {}", path.display()), ctx.verbosity());

    let shown = if key == "connection.password" {
        output::mask(Some(value))
    } else {
        value
    };
    output::print(format!("Set {} = {}", key, shown), ctx.verbosity());
    Ok(0)
}

/// List all effective settings values.
pub fn list(ctx: &Context) -> Result<i32> {
    let settings = ctx.load_settings()?;

    if ctx.json {
        let mut values = serde_json::Map::new();
        for key in KEYS {
            let value = effective(&settings, key)?;
            let value = if key == "connection.password" {
                value.map(|v| output::mask(Some(v.as_str())).to_string())
            } else {
                value
            };
            values.insert(key.to_string(), serde_json::json!(value));
        }
        output::json(&values)?;
        return Ok(0);
    }

    if let Some(path) = settings.global_loaded_from() {
        output::print(format!("# global: {}", path.display()), ctx.verbosity());
    }
    if let Some(path) = settings.project_loaded_from() {
        output::print(format!("# project: {}", path.display()), ctx.verbosity());
    }
    for key in KEYS {
        let value = effective(&settings, key)?;
        let shown = match (key, value.as_deref()) {
            ("connection.password", v) => output::mask(v).to_string(),
            (_, Some(v)) => v.to_string(),
            (_, None) => "(not set)".to_string(),
        };
        println!("{} = {}", key, shown);
    }

    Ok(0)
}
