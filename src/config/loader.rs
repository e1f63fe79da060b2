//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::config::ConfigError;

/// Load an options tree from a TOML or JSON file.
///
/// Files ending in `.json` are parsed as JSON, everything else as TOML.
pub fn load_options(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let options = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str::<Value>(&content)?
    };

    tracing::debug!(path = %path.display(), "Options loaded");
    Ok(options)
}
