//! Transom core: bootstraps HTTP APIs.
//!
//! A [`TransomCore`] holds plugins and a shared [`Registry`]. `initialize`
//! wraps a backend in the [`Server`] facade, installs the configured
//! middleware and runs every plugin's `initialize` and `preStart` phases in
//! registration order.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod orchestrator;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod server;

pub use orchestrator::TransomCore;
pub use error::{PluginError, TransomError};
pub use middleware::Middleware;
pub use plugin::{Phase, Plugin, PluginEntry, PreStart};
pub use registry::Registry;
pub use server::{handler, AxumBackend, Backend, MemoryBackend, RouteHandler, RouteMethod, Server};
