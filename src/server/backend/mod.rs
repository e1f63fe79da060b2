//! Server backends wrapped by the facade.
//!
//! - `axum_backend.rs`: serves HTTP through an axum router
//! - `memory.rs`: records calls without serving, for tests and dry runs

mod axum_backend;
mod memory;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::middleware::Middleware;
use crate::server::handler::{RouteArgs, RouteMethod};
use crate::server::ServerError;

pub use self::axum_backend::AxumBackend;
pub use self::memory::{MemoryBackend, Recording, Stage};

/// Mutable identity of a server: its name, public url/domain and log span.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub log: tracing::Span,
}

impl ServerIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let log = tracing::info_span!("server", name = %name);
        Self {
            name,
            url: None,
            domain: None,
            log,
        }
    }
}

/// Contract between the server facade and an HTTP framework.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short framework name used in diagnostics.
    fn framework(&self) -> &'static str;

    fn identity(&self) -> &ServerIdentity;

    fn identity_mut(&mut self) -> &mut ServerIdentity;

    fn route(&mut self, method: RouteMethod, args: RouteArgs) -> Result<(), ServerError>;

    /// Remove every route on `path`. Returns true if any existed.
    fn remove_route(&mut self, path: &str) -> bool;

    fn routes(&self) -> Vec<(RouteMethod, String)>;

    fn use_middleware(&mut self, middleware: Middleware) -> Result<(), ServerError>;

    fn pre(&mut self, middleware: Middleware) -> Result<(), ServerError>;

    fn middleware_count(&self) -> usize;

    async fn listen(&mut self, addr: SocketAddr) -> Result<SocketAddr, ServerError>;

    async fn close(&mut self) -> Result<(), ServerError>;

    fn local_addr(&self) -> Option<SocketAddr>;

    fn inflight_requests(&self) -> u64 {
        0
    }

    /// The compiled router, for backends that serve through axum.
    fn router(&self) -> Option<Result<axum::Router, ServerError>> {
        None
    }
}
