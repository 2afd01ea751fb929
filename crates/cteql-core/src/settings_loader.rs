//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `CTEQL_DEBUG` | `debug` |
//! | `CTEQL_LOG_LEVEL` | `log_level` |
//! | `CTEQL_DIALECT` | `dialect` |
//! | `CTEQL_CTE_PAGINATION` | `cte_pagination` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use cteql_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("cteql.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::CteqlError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, CteqlError> {
    // Deserialize through serde_json so absent keys keep their defaults.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| CteqlError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, CteqlError> {
    let content = read_config(path.as_ref(), "TOML")?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the TOML is malformed, or an
/// override has an invalid value.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, CteqlError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, CteqlError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| CteqlError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, CteqlError> {
    let content = read_config(path.as_ref(), "JSON")?;
    from_json_str(&content)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the JSON is malformed, or an
/// override has an invalid value.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, CteqlError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Loads settings from a file, picking the format from its extension
/// (`.json` => JSON, anything else => TOML), then applies environment overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or an override is invalid.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, CteqlError> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        from_json_file_with_env(path)
    } else {
        from_toml_file_with_env(path)
    }
}

/// Loads settings from just environment variables (starting from defaults).
///
/// # Errors
///
/// Returns an error if an override has an invalid value.
pub fn from_env() -> Result<Settings, CteqlError> {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Applies environment variable overrides to a settings struct.
///
/// Supported environment variables:
///
/// - `CTEQL_DEBUG` -> `debug` (values: "true"/"1"/"yes" => true, anything else => false)
/// - `CTEQL_LOG_LEVEL` -> `log_level`
/// - `CTEQL_DIALECT` -> `dialect`
/// - `CTEQL_CTE_PAGINATION` -> `cte_pagination` ("reject" or "drop")
///
/// # Errors
///
/// Returns an error if `CTEQL_CTE_PAGINATION` names an unknown policy.
pub fn apply_env_overrides(settings: &mut Settings) -> Result<(), CteqlError> {
    apply_overrides(settings, |key| std::env::var(key).ok())
}

/// Applies overrides read through `lookup`, keyed by environment variable name.
fn apply_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), CteqlError> {
    if let Some(val) = lookup("CTEQL_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Some(val) = lookup("CTEQL_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("CTEQL_DIALECT") {
        settings.dialect = val;
    }

    if let Some(val) = lookup("CTEQL_CTE_PAGINATION") {
        settings.cte_pagination = val.parse()?;
    }

    Ok(())
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, CteqlError> {
    std::fs::read_to_string(path).map_err(|e| {
        CteqlError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, CteqlError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        CteqlError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        CteqlError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
