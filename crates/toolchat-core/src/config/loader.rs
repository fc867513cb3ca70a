//! Config loader: reads `config.json`, migrates legacy keys, merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file (`./config.json` unless a path is given)
//! 3. Environment variables `TOOLCHAT_<SECTION>__<FIELD>` (override JSON)
//!
//! A missing default file falls back to defaults. A file that was asked for
//! explicitly but is missing, unreadable, or invalid is an error: the client
//! refuses to start on a broken configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::schema::Config;

/// Default config file name, resolved against the working directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Launcher for legacy `.py` tool server entry points.
const LEGACY_SCRIPT_LAUNCHER: &str = "python";

/// Default config file path.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Load configuration from `path` (or `./config.json`) + env vars.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config_from_path(p),
        None => {
            let default_path = default_config_path();
            if !default_path.exists() {
                info!(
                    "No config file found at {}, using defaults",
                    default_path.display()
                );
                return Ok(apply_env_overrides(Config::default()));
            }
            load_config_from_path(&default_path)
        }
    }
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Result<Config> {
    debug!("Loading config from {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    // Parse JSON → Value first for migration
    let mut raw: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;

    migrate_config(&mut raw);

    let config: Config = serde_json::from_value(raw)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;

    Ok(apply_env_overrides(config))
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    std::fs::write(path, json)?;
    debug!("Config saved to {}", path.display());
    Ok(())
}

/// Legacy snake_case keys → camelCase (`server_path` → `serverPath`,
/// `ai_model` → `aiModel`). An existing camelCase key wins.
///
/// Legacy configs pointed at a Python script that was always run with
/// `python`, so a migrated `.py` entry point gets that launcher unless
/// `serverCommand` is set.
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(obj) = raw.as_object_mut() else {
        return;
    };
    for (legacy, current) in [("server_path", "serverPath"), ("ai_model", "aiModel")] {
        if let Some(value) = obj.remove(legacy) {
            if obj.contains_key(current) {
                continue;
            }
            let is_script = legacy == "server_path"
                && value.as_str().is_some_and(|path| path.ends_with(".py"));
            if is_script && !obj.contains_key("serverCommand") {
                obj.insert("serverCommand".to_string(), LEGACY_SCRIPT_LAUNCHER.into());
                debug!("Legacy script {value} will be run with {LEGACY_SCRIPT_LAUNCHER}");
            }
            obj.insert(current.to_string(), value);
            debug!("Migrated {legacy} → {current}");
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Supported overrides:
/// - `TOOLCHAT_SERVER_PATH` → `serverPath`
/// - `TOOLCHAT_AI_MODEL` → `aiModel`
/// - `TOOLCHAT_PROVIDER__NAME` / `__API_KEY` / `__API_BASE` → `provider.*`
/// - `TOOLCHAT_AGENT__MAX_TOOL_ITERATIONS` / `__TEMPERATURE` → `agent.*`
/// - `TOOLCHAT_RUNTIME__INVOKE_TIMEOUT_SECS` → `runtime.invokeTimeoutSecs`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("TOOLCHAT_SERVER_PATH") {
        config.server_path = val;
    }
    if let Ok(val) = std::env::var("TOOLCHAT_AI_MODEL") {
        config.ai_model = val;
    }

    if let Ok(val) = std::env::var("TOOLCHAT_PROVIDER__NAME") {
        config.provider.name = Some(val);
    }
    if let Ok(val) = std::env::var("TOOLCHAT_PROVIDER__API_KEY") {
        config.provider.api_key = val;
    }
    if let Ok(val) = std::env::var("TOOLCHAT_PROVIDER__API_BASE") {
        config.provider.api_base = Some(val);
    }

    if let Ok(val) = std::env::var("TOOLCHAT_AGENT__MAX_TOOL_ITERATIONS") {
        if let Ok(n) = val.parse::<u32>() {
            config.agent.max_tool_iterations = n;
        }
    }
    if let Ok(val) = std::env::var("TOOLCHAT_AGENT__TEMPERATURE") {
        if let Ok(t) = val.parse::<f64>() {
            config.agent.temperature = t;
        }
    }

    if let Ok(val) = std::env::var("TOOLCHAT_RUNTIME__INVOKE_TIMEOUT_SECS") {
        if let Ok(n) = val.parse::<u64>() {
            config.runtime.invoke_timeout_secs = Some(n);
        }
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
