//! `GET <prefix>/health`.

use async_trait::async_trait;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::URI_PREFIX_KEY;
use crate::error::PluginError;
use crate::plugin::Plugin;
use crate::server::{handler, Server};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HealthOptions {
    path: String,
}

impl Default for HealthOptions {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
        }
    }
}

/// Registers a JSON health endpoint below the URI prefix.
///
/// Options: `{ "path": "/health" }`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HealthCheck;

#[async_trait]
impl Plugin for HealthCheck {
    fn name(&self) -> &str {
        "HealthCheck"
    }

    async fn initialize(&self, server: &mut Server, options: &Value) -> Result<(), PluginError> {
        let opts: HealthOptions = serde_json::from_value(options.clone())?;
        let prefix = server.registry().get_str(URI_PREFIX_KEY).unwrap_or_default();
        let body = json!({
            "status": "ok",
            "name": server.name(),
            "version": env!("CARGO_PKG_VERSION"),
        });

        server.get(
            format!("{prefix}{}", opts.path),
            handler(move |_req| {
                let body = body.clone();
                async move { Json(body) }
            }),
        )?;
        Ok(())
    }
}
