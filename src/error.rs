//! Error types surfaced by `TransomCore::initialize`.
//!
//! Every failure during startup ends up in a single [`TransomError`]. Plugin
//! errors keep their original value as the `source`, so callers can downcast
//! back to their own error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::plugin::Phase;
use crate::server::ServerError;

/// Error returned by a plugin's `initialize` or `pre_start`.
pub type PluginError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort server initialization.
#[derive(Error, Debug)]
pub enum TransomError {
    /// The runtime environment is below what the core supports.
    #[error("unsupported environment: {0}")]
    Environment(String),

    /// Malformed configuration (URI prefix, middleware options, config files).
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The wrapped server rejected a route or middleware.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// A plugin failed during one of its lifecycle phases.
    #[error("plugin `{plugin}` failed during {phase}: {source}")]
    Plugin {
        plugin: String,
        phase: Phase,
        #[source]
        source: PluginError,
    },
}

impl TransomError {
    /// The phase a plugin failure happened in, if this is a plugin failure.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            TransomError::Plugin { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The original plugin error, untouched.
    pub fn plugin_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            TransomError::Plugin { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn plugin_source_downcasts_to_original() {
        let err = TransomError::Plugin {
            plugin: "BoomPlugin".to_string(),
            phase: Phase::PreStart,
            source: Box::new(Boom),
        };
        assert_eq!(err.phase(), Some(Phase::PreStart));
        assert!(err.plugin_source().unwrap().downcast_ref::<Boom>().is_some());
        assert_eq!(
            err.to_string(),
            "plugin `BoomPlugin` failed during preStart: boom"
        );
    }

    #[test]
    fn panic_payloads_become_text() {
        let caught = std::panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(caught), "static message");

        let caught = std::panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(caught), "formatted 42");
    }
}
