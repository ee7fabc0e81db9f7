//! Configuration loading for warehouse-sync
//!
//! Provides utilities for reading process configuration from environment
//! variables and for locating files in the shared config and data
//! directories (~/.config/warehouse-sync/, ~/.local/share/warehouse-sync/).
//!
//! Call [`init`] at application startup to bootstrap the data directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory name used under the platform config and data roots
const APP_DIR: &str = "warehouse-sync";

/// Initialize the data directory.
///
/// Creates the data directory if it doesn't exist.
/// Call this once at application startup.
pub fn init() -> Result<PathBuf> {
    ensure_dir(data_dir())
}

/// Get the config directory (~/.config/warehouse-sync/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the data directory (~/.local/share/warehouse-sync/)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a config file within the config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Get the path to a file within the data directory
pub fn data_path(filename: &str) -> Option<PathBuf> {
    data_dir().map(|p| p.join(filename))
}

/// Load and parse a JSON config file from the config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse file: {}", path.display()))
}

/// Check if a config file exists in the config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

fn ensure_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = dir.context("Could not determine application directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    Ok(dir)
}

/// Read a required environment variable
pub fn env_required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} environment variable not set", name))
}

/// Read an optional environment variable, treating empty values as unset
pub fn env_optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read a boolean flag such as `REPEAT=yes`
///
/// Accepts `1`, `on`, `true` and `yes` (case-insensitive) as true.
/// An unset or empty variable yields `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    match env_optional(name) {
        Some(value) => is_truthy(&value),
        None => default,
    }
}

/// Parse an optional environment variable into `T`
pub fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_optional(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", name, raw, e)),
        None => Ok(None),
    }
}

/// Interpret a flag value the way the sync jobs always have
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "on" | "true" | "yes"
    )
}
