//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Run the config command against the config file at `config_path`.
pub fn run_config(action: &ConfigAction, settings: Settings, config_path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Set { key, value } => {
            let updated = set_value(&settings, key, value)?;
            updated.save_to(&config_path.to_path_buf())?;
            Output::success(&format!("Set {} = {}", key, value));
        }

        ConfigAction::Edit => {
            // Create default config if it doesn't exist
            if !config_path.exists() {
                settings.save_to(&config_path.to_path_buf())?;
                Output::info(&format!("Created default config at {:?}", config_path));
            }

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());

            Output::info(&format!("Opening config in {}...", editor));

            let status = std::process::Command::new(&editor)
                .arg(config_path)
                .status();

            match status {
                Ok(s) if s.success() => {
                    Output::success("Config saved.");
                }
                Ok(_) => {
                    Output::warning("Editor exited with non-zero status.");
                }
                Err(e) => {
                    Output::error(&format!("Failed to open editor: {}", e));
                    Output::info(&format!("Config file is at: {:?}", config_path));
                }
            }
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Apply a dotted `section.field = value` update and re-validate the result.
///
/// The value is read as a TOML literal when possible, otherwise as a string.
fn set_value(settings: &Settings, key: &str, value: &str) -> Result<Settings> {
    let mut root = toml::Value::try_from(settings).context("Failed to serialize config")?;

    let parts: Vec<&str> = key.split('.').collect();
    let Some((field, sections)) = parts.split_last() else {
        bail!("Empty config key");
    };

    let mut table = root
        .as_table_mut()
        .context("Config root is not a table")?;
    for section in sections {
        table = table
            .get_mut(*section)
            .and_then(|v| v.as_table_mut())
            .with_context(|| format!("Unknown config section '{}'", section))?;
    }

    let parsed = parse_literal(value);
    let new_value = match table.get(*field) {
        Some(existing) if existing.type_str() != parsed.type_str() => coerce(existing, value)?,
        _ => parsed,
    };
    table.insert(field.to_string(), new_value);

    let updated: Settings = root
        .try_into()
        .with_context(|| format!("Invalid value for '{}': {}", key, value))?;

    // Unknown fields deserialize fine and are then dropped.
    let written = toml::Value::try_from(&updated).context("Failed to serialize config")?;
    if lookup(&written, &parts).is_none() {
        bail!("Unknown config key '{}'", key);
    }

    Ok(updated)
}

fn lookup<'a>(root: &'a toml::Value, path: &[&str]) -> Option<&'a toml::Value> {
    path.iter().try_fold(root, |value, part| value.get(*part))
}

fn parse_literal(value: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("v = {}", value))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(value.to_string()))
}

/// Convert `value` to the type of the field it replaces.
fn coerce(existing: &toml::Value, value: &str) -> Result<toml::Value> {
    Ok(match existing {
        toml::Value::String(_) => toml::Value::String(value.to_string()),
        toml::Value::Float(_) => toml::Value::Float(value.parse()?),
        toml::Value::Integer(_) => toml::Value::Integer(value.parse()?),
        toml::Value::Boolean(_) => toml::Value::Boolean(value.parse()?),
        other => bail!("Cannot set a {} value from the command line", other.type_str()),
    })
}
