//! Plugin orchestrator.
//!
//! # Data Flow
//! ```text
//! configure(plugin, options)*          (registration, never calls plugins)
//!     → initialize(backend, options)
//!         → runtime check → normalize options → timezone advisory
//!         → Server::wrap → registry["transom-config"] = options
//!         → URI prefix default + validation
//!         → middleware::assemble
//!         → initialize phase (serial, registration order)
//!         → preStart phase   (serial, plugins with the capability)
//!     → Ok(Server) | Err(first failure)
//! ```
//!
//! # Design Decisions
//! - Phases are a serial fold: entry N+1 never starts before entry N settles
//! - The first failure aborts everything after it; nothing is rolled back
//! - A panicking plugin is reported like a returned error of that phase

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::{json, Value};

use crate::config::schema::is_falsy;
use crate::config::validation::ensure_uri_prefix;
use crate::config::ROOT_KEY;
use crate::error::{panic_message, PluginError, TransomError};
use crate::lifecycle::startup;
use crate::middleware;
use crate::observability::metrics;
use crate::plugin::{Phase, Plugin, PluginEntry};
use crate::registry::Registry;
use crate::server::{AxumBackend, Backend, Server};

const DEFAULT_SERVER_NAME: &str = "transom";

/// Owns the registry and the ordered plugin list.
#[derive(Debug, Default)]
pub struct TransomCore {
    registry: Arc<Registry>,
    plugins: Vec<PluginEntry>,
}

impl TransomCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry every server built by this core shares.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn plugins(&self) -> &[PluginEntry] {
        &self.plugins
    }

    /// Append a plugin. Missing or `null` options become `{}`.
    pub fn configure<P>(&mut self, plugin: P, options: impl Into<Option<Value>>)
    where
        P: Plugin + 'static,
    {
        self.configure_shared(Arc::new(plugin), options);
    }

    /// Like [`TransomCore::configure`] for a plugin the caller keeps a handle to.
    pub fn configure_shared(&mut self, plugin: Arc<dyn Plugin>, options: impl Into<Option<Value>>) {
        let options = match options.into() {
            None | Some(Value::Null) => json!({}),
            Some(options) => options,
        };
        tracing::debug!(plugin = plugin.name(), "Plugin configured");
        self.plugins.push(PluginEntry { plugin, options });
    }

    /// Build a server on an axum backend named after `transom.requestLogger.name`.
    pub async fn initialize_default(&self, options: impl Into<Option<Value>>) -> Result<Server, TransomError> {
        let options = normalize_options(options.into());
        let name = options
            .pointer("/transom/requestLogger/name")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SERVER_NAME)
            .to_string();
        self.initialize(AxumBackend::new(name), options).await
    }

    /// Wrap `backend`, configure it from `options` and run every plugin.
    pub async fn initialize(
        &self,
        backend: impl Backend + 'static,
        options: impl Into<Option<Value>>,
    ) -> Result<Server, TransomError> {
        let result = self.run(Box::new(backend), options.into()).await;
        if let Err(err) = &result {
            tracing::error!(error = %err, "Server initialization failed");
        }
        result
    }

    async fn run(&self, backend: Box<dyn Backend>, options: Option<Value>) -> Result<Server, TransomError> {
        startup::check_environment()?;
        let options = normalize_options(options);

        let suppressed = options
            .pointer("/transom/suppressTimezoneWarning")
            .is_some_and(|v| !is_falsy(v));
        startup::warn_timezone_once(suppressed);

        let mut server = Server::from_boxed(backend, Arc::clone(&self.registry));

        tracing::debug!("Storing options under {ROOT_KEY}");
        self.registry.set(ROOT_KEY, options);

        let prefix = ensure_uri_prefix(&self.registry)?;
        tracing::debug!(prefix = %prefix, "Using URI prefix");

        middleware::assemble(&mut server)?;

        self.run_initialize(&mut server).await?;
        self.run_pre_start(&mut server).await?;

        tracing::debug!(server = %server, routes = ?server.routes(), "Server initialized");
        Ok(server)
    }

    async fn run_initialize(&self, server: &mut Server) -> Result<(), TransomError> {
        for entry in &self.plugins {
            let name = entry.plugin.name().to_string();
            tracing::debug!(plugin = %name, "Initializing plugin");

            let started = Instant::now();
            let outcome = catch_plugin(entry.plugin.initialize(server, &entry.options)).await;
            metrics::record_plugin_phase(&name, Phase::Initialize, started, outcome.is_ok());

            outcome.map_err(|source| TransomError::Plugin {
                plugin: name,
                phase: Phase::Initialize,
                source,
            })?;
        }
        Ok(())
    }

    async fn run_pre_start(&self, server: &mut Server) -> Result<(), TransomError> {
        for entry in &self.plugins {
            let Some(pre_start) = entry.plugin.as_pre_start() else {
                continue;
            };
            let name = entry.plugin.name().to_string();
            tracing::debug!(plugin = %name, "Running plugin preStart");

            let started = Instant::now();
            let outcome = catch_plugin(pre_start.pre_start(server, &entry.options)).await;
            metrics::record_plugin_phase(&name, Phase::PreStart, started, outcome.is_ok());

            outcome.map_err(|source| TransomError::Plugin {
                plugin: name,
                phase: Phase::PreStart,
                source,
            })?;
        }
        Ok(())
    }
}

/// Absent options become `{}`, and a falsy `transom` namespace becomes `{}`.
fn normalize_options(options: Option<Value>) -> Value {
    let mut options = match options {
        Some(options @ Value::Object(_)) => options,
        None | Some(Value::Null) => json!({}),
        Some(other) => {
            tracing::warn!(options = %other, "Ignoring options that are not an object");
            json!({})
        }
    };
    if let Value::Object(map) = &mut options {
        let transom = map.entry("transom").or_insert_with(|| json!({}));
        if is_falsy(transom) {
            *transom = json!({});
        }
    }
    options
}

/// Await a plugin phase, turning a panic into an error.
async fn catch_plugin<F>(phase: F) -> Result<(), PluginError>
where
    F: std::future::Future<Output = Result<(), PluginError>>,
{
    match AssertUnwindSafe(phase).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(format!("plugin panicked: {}", panic_message(payload)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_fills_namespace() {
        assert_eq!(normalize_options(None), json!({"transom": {}}));
        assert_eq!(normalize_options(Some(Value::Null)), json!({"transom": {}}));
        assert_eq!(
            normalize_options(Some(json!({"transom": null, "x": 1}))),
            json!({"transom": {}, "x": 1})
        );
        assert_eq!(
            normalize_options(Some(json!({"transom": {"cors": false}}))),
            json!({"transom": {"cors": false}})
        );
    }

    #[test]
    fn falsy_namespace_and_non_object_options_are_replaced() {
        for falsy in [json!(false), json!(0), json!("")] {
            assert_eq!(
                normalize_options(Some(json!({"transom": falsy, "x": 1}))),
                json!({"transom": {}, "x": 1})
            );
        }
        assert_eq!(normalize_options(Some(json!([1, 2]))), json!({"transom": {}}));
        assert_eq!(normalize_options(Some(json!("opts"))), json!({"transom": {}}));
    }

    #[test]
    fn default_core_has_an_object_registry() {
        let core = TransomCore::default();
        assert!(!core.registry().has("anything"));
        core.registry().set("a.b", 1);
        assert_eq!(core.registry().get("a"), Some(json!({"b": 1})));
        assert_eq!(core.registry().get("a.b"), Some(json!(1)));
    }

    #[test]
    fn configure_defaults_options() {
        struct Noop;

        #[async_trait::async_trait]
        impl Plugin for Noop {
            async fn initialize(&self, _: &mut Server, _: &Value) -> Result<(), PluginError> {
                Ok(())
            }
        }

        let mut core = TransomCore::new();
        core.configure(Noop, None::<Value>);
        core.configure(Noop, json!({"a": 1}));
        core.configure(Noop, Value::Null);

        let options: Vec<&Value> = core.plugins().iter().map(|e| &e.options).collect();
        assert_eq!(options, vec![&json!({}), &json!({"a": 1}), &json!({})]);
    }
}
