//! Modular configuration loader.
//!
//! Supports splitting the forecast configuration across files:
//! - `config.json` - Core configuration (election shape, analytics, observability)
//! - `parties.json` - Party roster (array, replaces `parties`)
//! - `blocks.json` - Proportional blocks (array, replaces `blocks`)
//! - `coalitions.json` - Coalition groupings (array, replaces `coalitions`)
//! - `models.json` - Model parameters (object, merged into `models`)
//!
//! Files are loaded from `~/.seatcast/` unless another directory is given.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{config_dir, ForecastConfig};

/// Configuration file names
pub const CONFIG_FILES: &[&str] = &[
    "config.json",
    "parties.json",
    "blocks.json",
    "coalitions.json",
    "models.json",
];

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => {
                        merge_json(target_value, source_value);
                    }
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Insert or merge `value` under `key` of the root object.
fn merge_section(config: &mut Value, key: &str, value: Value) {
    if let Some(config_obj) = config.as_object_mut() {
        match config_obj.get_mut(key) {
            Some(existing) => merge_json(existing, value),
            None => {
                config_obj.insert(key.to_string(), value);
            }
        }
    }
}

/// Load modular configuration from the config directory as raw JSON.
///
/// Priority (lowest to highest):
/// 1. config.json
/// 2. Modular files (parties.json, blocks.json, ...)
/// 3. Environment variables (applied separately)
pub fn load_modular_config(dir: Option<PathBuf>) -> Result<Value> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    let mut config =
        load_json_file(&cfg_dir.join("config.json"))?.unwrap_or(Value::Object(Default::default()));

    tracing::debug!("Loading modular config from {}", cfg_dir.display());

    for (file, key) in [
        ("parties.json", "parties"),
        ("blocks.json", "blocks"),
        ("coalitions.json", "coalitions"),
        ("models.json", "models"),
    ] {
        if let Some(section) = load_json_file(&cfg_dir.join(file))? {
            merge_section(&mut config, key, section);
            tracing::debug!(file, "Loaded modular config file");
        }
    }

    Ok(config)
}

/// Load modular configuration and deserialize it, applying env overrides.
pub fn load_forecast_config(dir: Option<PathBuf>) -> Result<ForecastConfig> {
    let value = load_modular_config(dir)?;
    let mut config: ForecastConfig =
        serde_json::from_value(value).context("Failed to deserialize merged configuration")?;
    config.apply_env_overrides();
    Ok(config)
}

/// Check which modular config files exist.
pub fn check_modular_files(dir: Option<PathBuf>) -> Vec<(String, bool)> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    CONFIG_FILES
        .iter()
        .map(|file| {
            let path = cfg_dir.join(file);
            (file.to_string(), path.exists())
        })
        .collect()
}
