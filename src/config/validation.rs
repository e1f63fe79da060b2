//! Configuration validation.
//!
//! # Responsibilities
//! - Default the URI prefix when the definition omits it
//! - Reject prefixes that would produce malformed route paths
//!
//! Validation runs before any middleware or plugin sees the registry.

use crate::config::schema::{DEFAULT_URI_PREFIX, URI_PREFIX_KEY};
use crate::config::ConfigError;
use crate::registry::Registry;

/// A URI prefix must be non-empty, start with `/` and not end with `/`.
pub fn validate_uri_prefix(prefix: &str) -> Result<(), ConfigError> {
    if prefix.starts_with('/') && !prefix.ends_with('/') {
        Ok(())
    } else {
        Err(ConfigError::InvalidUriPrefix(prefix.to_string()))
    }
}

/// Default the prefix in the registry if unset, then validate it.
///
/// Returns the prefix in effect.
pub fn ensure_uri_prefix(registry: &Registry) -> Result<String, ConfigError> {
    if !registry.has(URI_PREFIX_KEY) {
        registry.set(URI_PREFIX_KEY, DEFAULT_URI_PREFIX);
    }

    let prefix = match registry.get(URI_PREFIX_KEY) {
        Some(serde_json::Value::String(prefix)) => prefix,
        Some(other) => return Err(ConfigError::InvalidUriPrefix(other.to_string())),
        None => return Err(ConfigError::InvalidUriPrefix(String::new())),
    };

    validate_uri_prefix(&prefix)?;
    Ok(prefix)
}
