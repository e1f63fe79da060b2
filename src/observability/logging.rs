//! Structured logging setup.
//!
//! # Design Decisions
//! - `RUST_LOG` wins when set; otherwise the crate and tower-http log at debug
//! - Initialization is idempotent so tests and binaries can both call it

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "transom_core=debug,tower_http=debug";

/// Install the global fmt subscriber. Returns false if one was already set.
pub fn init_logging() -> bool {
    init_logging_with(DEFAULT_FILTER)
}

pub fn init_logging_with(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
