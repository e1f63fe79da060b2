//! Server facade subsystem.
//!
//! # Data Flow
//! ```text
//! plugin / core
//!     → Server (stable surface: verbs, use, pre, listen, close, on, registry)
//!         → events.rs (route events, delivered before delegation)
//!         → Backend (axum.rs serves traffic, memory.rs records calls)
//! ```
//!
//! # Design Decisions
//! - The core and plugins only ever see `Server`; backends are chosen at construction
//! - Calls are pure delegation: arguments and results pass through untouched
//! - The registry is shared by `Arc`, never copied

pub mod backend;
pub mod events;
pub mod handler;
pub mod inflight;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::middleware::Middleware;
use crate::observability::metrics;
use crate::registry::Registry;

pub use backend::{AxumBackend, Backend, MemoryBackend, ServerIdentity, Stage};
pub use events::{EventBus, ServerEvent};
pub use handler::{handler, RouteArgs, RouteHandler, RouteMethod};

/// Errors raised by a backend. The facade adds none of its own.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid route path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: RouteMethod, path: String },

    #[error("failed to install {kind} middleware: {reason}")]
    Middleware { kind: String, reason: String },

    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("server is already listening on {0}")]
    AlreadyListening(SocketAddr),

    #[error("server task failed: {0}")]
    Serve(String),
}

/// Summary returned by [`Server::debug_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub framework: &'static str,
    pub routes: usize,
    pub middleware: usize,
    pub address: Option<SocketAddr>,
}

/// The stable server surface handed to plugins.
pub struct Server {
    backend: Box<dyn Backend>,
    registry: Arc<Registry>,
    events: EventBus,
}

impl Server {
    /// Wrap `backend`, sharing `registry` with everything that holds this server.
    pub fn wrap(backend: impl Backend + 'static, registry: Arc<Registry>) -> Self {
        Self::from_boxed(Box::new(backend), registry)
    }

    pub fn from_boxed(backend: Box<dyn Backend>, registry: Arc<Registry>) -> Self {
        Self {
            backend,
            registry,
            events: EventBus::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The wrapped backend, for calls the facade does not expose.
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn Backend {
        self.backend.as_mut()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // --- Identity ---

    pub fn name(&self) -> &str {
        &self.backend.identity().name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.backend.identity_mut().name = name.into();
    }

    pub fn url(&self) -> Option<&str> {
        self.backend.identity().url.as_deref()
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.backend.identity_mut().url = Some(url.into());
    }

    pub fn domain(&self) -> Option<&str> {
        self.backend.identity().domain.as_deref()
    }

    pub fn set_domain(&mut self, domain: impl Into<String>) {
        self.backend.identity_mut().domain = Some(domain.into());
    }

    /// Span that server-level logging is recorded under.
    pub fn log(&self) -> &tracing::Span {
        &self.backend.identity().log
    }

    pub fn set_log(&mut self, span: tracing::Span) {
        self.backend.identity_mut().log = span;
    }

    // --- Routes ---

    /// Emit the verb's route event, then register the route with the backend.
    pub fn route(
        &mut self,
        method: RouteMethod,
        path: impl Into<String>,
        handler: RouteHandler,
    ) -> Result<(), ServerError> {
        let args = RouteArgs {
            path: path.into(),
            handler,
        };
        self.events.emit(&ServerEvent::Route {
            method,
            args: args.clone(),
        });
        metrics::record_route_registered(method);
        self.backend.route(method, args)
    }

    pub fn get(&mut self, path: impl Into<String>, handler: RouteHandler) -> Result<(), ServerError> {
        self.route(RouteMethod::Get, path, handler)
    }

    pub fn head(&mut self, path: impl Into<String>, handler: RouteHandler) -> Result<(), ServerError> {
        self.route(RouteMethod::Head, path, handler)
    }

    pub fn post(&mut self, path: impl Into<String>, handler: RouteHandler) -> Result<(), ServerError> {
        self.route(RouteMethod::Post, path, handler)
    }

    pub fn put(&mut self, path: impl Into<String>, handler: RouteHandler) -> Result<(), ServerError> {
        self.route(RouteMethod::Put, path, handler)
    }

    pub fn patch(&mut self, path: impl Into<String>, handler: RouteHandler) -> Result<(), ServerError> {
        self.route(RouteMethod::Patch, path, handler)
    }

    pub fn del(&mut self, path: impl Into<String>, handler: RouteHandler) -> Result<(), ServerError> {
        self.route(RouteMethod::Del, path, handler)
    }

    pub fn opts(&mut self, path: impl Into<String>, handler: RouteHandler) -> Result<(), ServerError> {
        self.route(RouteMethod::Opts, path, handler)
    }

    /// Remove every route on `path`. Returns true if any existed.
    pub fn rm(&mut self, path: &str) -> bool {
        self.events.emit(&ServerEvent::RouteRemoved {
            path: path.to_string(),
        });
        self.backend.remove_route(path)
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> Vec<(RouteMethod, String)> {
        self.backend.routes()
    }

    // --- Middleware ---

    /// Attach middleware that runs after routing, in attachment order.
    pub fn use_middleware(&mut self, middleware: Middleware) -> Result<(), ServerError> {
        metrics::record_middleware_installed(middleware.name());
        self.backend.use_middleware(middleware)
    }

    /// Attach middleware that runs before route dispatch.
    pub fn pre(&mut self, middleware: Middleware) -> Result<(), ServerError> {
        metrics::record_middleware_installed(middleware.name());
        self.backend.pre(middleware)
    }

    // --- Lifecycle ---

    /// Start accepting connections. Returns the bound address.
    pub async fn listen(&mut self, addr: SocketAddr) -> Result<SocketAddr, ServerError> {
        let bound = self.backend.listen(addr).await?;
        tracing::info!(parent: self.log(), address = %bound, "Server listening");
        self.events.emit(&ServerEvent::Listening { addr: bound });
        Ok(bound)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn close(&mut self) -> Result<(), ServerError> {
        let was_listening = self.backend.local_addr().is_some();
        self.backend.close().await?;
        if was_listening {
            tracing::info!(parent: self.log(), "Server closed");
            self.events.emit(&ServerEvent::Closed);
        }
        Ok(())
    }

    /// Subscribe to a named event (`transom.route.get`, `listening`, ...).
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.events.on(event, listener);
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.backend.local_addr()
    }

    /// Router for in-process dispatch, if the backend serves through axum.
    pub fn router(&self) -> Option<Result<axum::Router, ServerError>> {
        self.backend.router()
    }

    pub fn inflight_requests(&self) -> u64 {
        self.backend.inflight_requests()
    }

    pub fn debug_info(&self) -> DebugInfo {
        DebugInfo {
            framework: self.backend.framework(),
            routes: self.backend.routes().len(),
            middleware: self.backend.middleware_count(),
            address: self.backend.local_addr(),
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.url() {
            Some(url) => write!(f, "{} ({}) at {}", self.name(), self.backend.framework(), url),
            None => write!(f, "{} ({})", self.name(), self.backend.framework()),
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name())
            .field("framework", &self.backend.framework())
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn memory_server() -> (Server, Arc<Mutex<backend::Recording>>) {
        let backend = MemoryBackend::new("test");
        let recording = backend.recording();
        (Server::wrap(backend, Arc::new(Registry::new())), recording)
    }

    #[test]
    fn registry_is_shared_not_copied() {
        let registry = Arc::new(Registry::new());
        let server = Server::wrap(MemoryBackend::new("test"), Arc::clone(&registry));
        registry.set("a.b", 1);
        assert!(Arc::ptr_eq(server.registry(), &registry));
        assert!(server.registry().has("a.b"));
    }

    #[test]
    fn identity_passes_through() {
        let (mut server, _) = memory_server();
        assert_eq!(server.name(), "test");

        server.set_name("Mrs. Red");
        assert_eq!(server.name(), "Mrs. Red");
        assert_eq!(server.backend().identity().name, "Mrs. Red");

        server.set_name("Mr. Cyan");
        server.set_url("http://example.test");
        server.set_domain("example.test");
        assert_eq!(server.name(), "Mr. Cyan");
        assert_eq!(server.url(), Some("http://example.test"));
        assert_eq!(server.domain(), Some("example.test"));
        assert_eq!(server.to_string(), "Mr. Cyan (memory) at http://example.test");
    }

    #[test]
    fn verbs_emit_once_before_delegating() {
        let (mut server, recording) = memory_server();
        let seen: Arc<Mutex<Vec<(String, String, usize)>>> = Arc::default();

        for method in RouteMethod::ALL {
            let seen = Arc::clone(&seen);
            let recording = Arc::clone(&recording);
            server.on(method.event_name(), move |event| {
                if let ServerEvent::Route { args, .. } = event {
                    // Backend has not seen the route yet.
                    let registered = recording.lock().unwrap().routes.len();
                    seen.lock()
                        .unwrap()
                        .push((event.name().to_string(), args.path.clone(), registered));
                }
            });
        }

        for (i, method) in RouteMethod::ALL.into_iter().enumerate() {
            let path = format!("/calling/{}", method.verb());
            let h = handler(|_req| async { "ok" });
            server.route(method, path.clone(), h.clone()).unwrap();

            let recorded = recording.lock().unwrap();
            let (recorded_method, args) = &recorded.routes[i];
            assert_eq!(*recorded_method, method);
            assert_eq!(args.path, path);
            assert!(args.handler.same_as(&h));
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), RouteMethod::ALL.len());
        for (i, method) in RouteMethod::ALL.into_iter().enumerate() {
            assert_eq!(seen[i].0, method.event_name());
            assert_eq!(seen[i].1, format!("/calling/{}", method.verb()));
            assert_eq!(seen[i].2, i);
        }
    }

    #[test]
    fn named_verbs_map_to_methods() {
        let (mut server, recording) = memory_server();
        let h = handler(|_req| async { "ok" });
        server.get("/a", h.clone()).unwrap();
        server.head("/a", h.clone()).unwrap();
        server.post("/a", h.clone()).unwrap();
        server.put("/a", h.clone()).unwrap();
        server.patch("/a", h.clone()).unwrap();
        server.del("/a", h.clone()).unwrap();
        server.opts("/a", h).unwrap();

        let methods: Vec<RouteMethod> = recording
            .lock()
            .unwrap()
            .routes
            .iter()
            .map(|(m, _)| *m)
            .collect();
        assert_eq!(methods, RouteMethod::ALL.to_vec());
    }

    #[test]
    fn rm_emits_and_removes() {
        let (mut server, _) = memory_server();
        let removed: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&removed);
        server.on(events::ROUTE_REMOVED_EVENT, move |event| {
            if let ServerEvent::RouteRemoved { path } = event {
                sink.lock().unwrap().push(path.clone());
            }
        });

        server.get("/gone", handler(|_req| async { "x" })).unwrap();
        assert!(server.rm("/gone"));
        assert!(!server.rm("/gone"));
        assert!(server.routes().is_empty());
        assert_eq!(*removed.lock().unwrap(), vec!["/gone", "/gone"]);
    }

    #[test]
    fn middleware_passes_through() {
        let (mut server, recording) = memory_server();
        server.pre(Middleware::RequestLocals).unwrap();
        server.use_middleware(Middleware::RequestLocals).unwrap();

        assert_eq!(server.debug_info().middleware, 2);
        {
            let recorded = recording.lock().unwrap();
            assert_eq!(recorded.count(Stage::Pre), 1);
            assert_eq!(recorded.count(Stage::Use), 1);
        }
        assert_eq!(server.debug_info().middleware, 2);
    }

    #[tokio::test]
    async fn listen_and_close_emit_lifecycle_events() {
        let (mut server, _) = memory_server();
        let names: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        for event in [events::LISTENING_EVENT, events::CLOSE_EVENT] {
            let names = Arc::clone(&names);
            server.on(event, move |e| names.lock().unwrap().push(e.name()));
        }

        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(server.listen(addr).await.unwrap(), addr);
        assert_eq!(server.address(), Some(addr));
        server.close().await.unwrap();
        // Closing an idle server is a no-op.
        server.close().await.unwrap();

        assert_eq!(*names.lock().unwrap(), vec!["listening", "close"]);
    }
}
