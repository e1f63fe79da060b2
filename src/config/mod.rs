//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! options tree (serde_json::Value, or a TOML/JSON file via loader.rs)
//!     → stored in the Registry under "transom-config"
//!     → validation.rs (URI prefix)
//!     → schema.rs (typed per-middleware options, read on demand)
//!     → middleware assembly
//! ```
//!
//! # Design Decisions
//! - The registry is the source of truth; typed structs are views over it
//! - Every middleware option struct has defaults so `{}` is a valid config
//! - Keys stay camelCase to match existing API definition files

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::load_options;
pub use schema::{MiddlewareKind, ROOT_KEY, URI_PREFIX_KEY};
pub use validation::validate_uri_prefix;

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URI prefix: {0:?}")]
    InvalidUriPrefix(String),

    #[error("invalid options at `{path}`: {source}")]
    InvalidOptions {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
}
