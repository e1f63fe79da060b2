//! Logs every route as it is registered, and the full table before start.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PluginError;
use crate::plugin::{Plugin, PreStart};
use crate::server::{RouteMethod, Server, ServerEvent};

#[derive(Debug, Default, Clone, Copy)]
pub struct RouteLogger;

#[async_trait]
impl Plugin for RouteLogger {
    fn name(&self) -> &str {
        "RouteLogger"
    }

    async fn initialize(&self, server: &mut Server, _options: &Value) -> Result<(), PluginError> {
        let span = server.log().clone();
        for method in RouteMethod::ALL {
            let span = span.clone();
            server.on(method.event_name(), move |event| {
                if let ServerEvent::Route { method, args } = event {
                    tracing::debug!(parent: &span, %method, path = %args.path, "Route registered");
                }
            });
        }
        Ok(())
    }

    fn as_pre_start(&self) -> Option<&dyn PreStart> {
        Some(self)
    }
}

#[async_trait]
impl PreStart for RouteLogger {
    async fn pre_start(&self, server: &mut Server, _options: &Value) -> Result<(), PluginError> {
        let routes = server.routes();
        tracing::info!(parent: server.log(), count = routes.len(), "Mounted routes");
        for (method, path) in routes {
            tracing::info!(parent: server.log(), %method, %path, "Route");
        }
        Ok(())
    }
}
