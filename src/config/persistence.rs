//! Config file load, save, and migration logic.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::types::{
    validate_poll_interval, AgentConfig, DEFAULT_POLL_INTERVAL,
};

/// Legacy key renames: (section, old key, new key).
const RENAMED_KEYS: &[(&str, &str, &str)] = &[
    ("connection", "verify_ssl", "verify_certificates"),
    ("connection", "tls_min", "minimum_tls_version"),
    ("options", "scan_interval", "poll_interval_seconds"),
];

/// Default config location: `config.json` next to the executable.
pub fn default_config_path() -> Result<PathBuf> {
    let exe_dir = std::env::current_exe()?
        .parent()
        .ok_or_else(|| anyhow!("Cannot determine executable directory"))?
        .to_path_buf();
    Ok(exe_dir.join("config.json"))
}

pub fn resolve_config_path(path: Option<&str>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(PathBuf::from(p)),
        None => default_config_path(),
    }
}

/// Migrate config to current key names and fill in new defaults.
/// Returns true when the file was rewritten.
pub(crate) fn migrate_config(config_path: &Path) -> Result<bool> {
    if !config_path.exists() {
        return Ok(false);
    }

    let content = std::fs::read_to_string(config_path)?;
    let mut json: Value = serde_json::from_str(&content)?;
    let mut migrated = false;

    let root = json
        .as_object_mut()
        .ok_or_else(|| anyhow!("Config root is not a JSON object"))?;

    // === RENAMES ===
    for (section, old, new) in RENAMED_KEYS {
        let Some(table) = root.get_mut(*section).and_then(Value::as_object_mut) else {
            continue;
        };
        if let Some(value) = table.remove(*old) {
            if !table.contains_key(*new) {
                table.insert(new.to_string(), value);
            }
            info!("Migrated: renamed '{}.{}' to '{}.{}'", section, old, section, new);
            migrated = true;
        }
    }

    // === ADDITIONS ===
    if !root.contains_key("options") {
        root.insert("options".to_string(), Value::Object(Map::new()));
    }
    if let Some(options) = root.get_mut("options").and_then(Value::as_object_mut) {
        if !options.contains_key("poll_interval_seconds") {
            options.insert("poll_interval_seconds".to_string(), serde_json::json!(DEFAULT_POLL_INTERVAL));
            info!("Migrated: added 'poll_interval_seconds' with default {}", DEFAULT_POLL_INTERVAL);
            migrated = true;
        }
    }

    if migrated {
        std::fs::write(config_path, serde_json::to_string_pretty(&json)?)?;
        info!("Config migrated to latest version: {:?}", config_path);
    }

    Ok(migrated)
}

pub async fn load_config(path: Option<&str>) -> Result<AgentConfig> {
    let config_path = resolve_config_path(path)?;

    // Migrate config first (handles old configs automatically)
    if let Err(e) = migrate_config(&config_path) {
        warn!("Config migration check failed: {}", e);
    }

    if !config_path.exists() {
        info!("Config file not found. Please run the setup wizard ('--setup') to generate one.");
        return Ok(AgentConfig::default());
    }

    let content = tokio::fs::read_to_string(&config_path)
        .await
        .with_context(|| format!("Failed to read config: {:?}", config_path))?;
    let mut config: AgentConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {:?}", config_path))?;

    if !config.connection.is_configured() {
        warn!("CIMC host is not configured in {:?}. Agent will fail to connect.", config_path);
        warn!("Please run the setup wizard ('--setup') or edit the config file manually.");
    }
    if let Err(e) = validate_poll_interval(config.options.poll_interval_seconds) {
        warn!("{}; using {} seconds", e, DEFAULT_POLL_INTERVAL);
        config.options.poll_interval_seconds = DEFAULT_POLL_INTERVAL;
    }

    info!("Loaded configuration from: {:?}", config_path);
    Ok(config)
}

pub async fn save_config(config: &AgentConfig, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write config: {:?}", path))?;
    info!("Configuration saved to: {:?}", path);
    Ok(())
}
