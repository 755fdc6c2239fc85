//! Settings loading from configuration files.
//!
//! This module provides functions to load [`Settings`] from TOML files, JSON
//! files, and to apply environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults). Keys the file does
//!    not set keep their defaults; unknown keys are logged and ignored.
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `KITTY_DEBUG` | `debug` |
//! | `KITTY_LOG_LEVEL` | `log_level` |
//! | `KITTY_ASSETS_DIR` | `assets_dir` |
//! | `KITTY_METADATA_FILE` | `metadata_file_name` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use kitty_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("kitty.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::KittyError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, KittyError> {
    // Merge over the serialized defaults so partial files are accepted.
    let table: toml::Table = toml::from_str(toml_str)
        .map_err(|e| KittyError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    let value = serde_json::to_value(table).map_err(|e| {
        KittyError::ConfigurationError(format!("Failed to convert TOML settings: {e}"))
    })?;
    overlay_defaults(value, "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, KittyError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        KittyError::ConfigurationError(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, KittyError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, KittyError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| KittyError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    overlay_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, KittyError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        KittyError::ConfigurationError(format!(
            "Failed to read JSON file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_json_str(&content)
}

/// Loads settings from a file chosen by extension, then applies environment
/// variable overrides.
///
/// `.json` files are read as JSON; anything else is read as TOML.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, KittyError> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let mut settings = if is_json {
        from_json_file(path)?
    } else {
        from_toml_file(path)?
    };
    apply_env_overrides(&mut settings);
    tracing::debug!(path = %path.display(), "Loaded settings");
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies environment variable overrides to a settings struct.
///
/// - `KITTY_DEBUG` -> `debug` (values: "true"/"1"/"yes" => true, anything else => false)
/// - `KITTY_LOG_LEVEL` -> `log_level`
/// - `KITTY_ASSETS_DIR` -> `assets_dir` (empty clears it)
/// - `KITTY_METADATA_FILE` -> `metadata_file_name` (ignored when empty)
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("KITTY_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(val) = std::env::var("KITTY_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("KITTY_ASSETS_DIR") {
        settings.assets_dir = if val.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(val))
        };
    }

    if let Ok(val) = std::env::var("KITTY_METADATA_FILE") {
        if !val.trim().is_empty() {
            settings.metadata_file_name = val;
        }
    }
}

// ============================================================
// Helpers
// ============================================================

/// Overlays the keys set in a config file onto the serialized defaults.
///
/// Settings are flat, so a key replaces the default value as a whole.
fn overlay_defaults(file: serde_json::Value, format: &str) -> Result<Settings, KittyError> {
    let serde_json::Value::Object(overrides) = file else {
        return Err(KittyError::ConfigurationError(format!(
            "{format} settings must be a table of keys"
        )));
    };
    let mut fields = match serde_json::to_value(Settings::default()) {
        Ok(serde_json::Value::Object(fields)) => fields,
        Ok(_) => {
            return Err(KittyError::ConfigurationError(
                "Default settings did not serialize to a table".into(),
            ))
        }
        Err(e) => {
            return Err(KittyError::ConfigurationError(format!(
                "Failed to serialize default settings: {e}"
            )))
        }
    };

    for (key, value) in overrides {
        if fields.contains_key(&key) {
            fields.insert(key, value);
        } else {
            tracing::warn!(key = %key, format, "Ignoring unknown setting");
        }
    }
    serde_json::from_value(serde_json::Value::Object(fields)).map_err(|e| {
        KittyError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}
