//! Plugin capability traits.
//!
//! A plugin must implement [`Plugin::initialize`]. It may also take part in
//! the `preStart` phase by implementing [`PreStart`] and returning itself from
//! [`Plugin::as_pre_start`]:
//!
//! ```ignore
//! #[async_trait]
//! impl Plugin for Audit {
//!     async fn initialize(&self, server: &mut Server, options: &Value) -> Result<(), PluginError> { .. }
//!     fn as_pre_start(&self) -> Option<&dyn PreStart> { Some(self) }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PluginError;
use crate::server::Server;

/// Plugin lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Initialize,
    PreStart,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initialize => f.write_str("initialize"),
            Phase::PreStart => f.write_str("preStart"),
        }
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Set up routes, middleware or registry state on the configured server.
    async fn initialize(&self, server: &mut Server, options: &Value) -> Result<(), PluginError>;

    /// The optional `preStart` capability.
    fn as_pre_start(&self) -> Option<&dyn PreStart> {
        None
    }
}

/// Runs after every plugin has initialized.
#[async_trait]
pub trait PreStart: Send + Sync {
    async fn pre_start(&self, server: &mut Server, options: &Value) -> Result<(), PluginError>;
}

/// A registered plugin and the options it was configured with.
#[derive(Clone)]
pub struct PluginEntry {
    pub plugin: Arc<dyn Plugin>,
    pub options: Value,
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("plugin", &self.plugin.name())
            .field("options", &self.options)
            .finish()
    }
}
