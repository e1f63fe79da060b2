//! axum-backed server.
//!
//! Routes and middleware are recorded as they arrive and compiled into a
//! `Router` when [`AxumBackend::compile`] is called (and on `listen`).
//!
//! Layering, outermost first:
//! ```text
//! inflight tracking → pre middleware → routing → use middleware → handler
//! ```
//! Within each stage middleware runs in attachment order.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::panic_message;
use crate::lifecycle::shutdown::Shutdown;
use crate::middleware::{Middleware, RouterLayer};
use crate::server::backend::{Backend, ServerIdentity};
use crate::server::handler::{RouteArgs, RouteMethod};
use crate::server::inflight::{track_inflight, InflightTracker};
use crate::server::ServerError;

struct Installed {
    name: String,
    layer: RouterLayer,
}

struct Running {
    addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<std::io::Result<()>>,
}

/// Backend serving HTTP/1.1 through axum.
pub struct AxumBackend {
    identity: ServerIdentity,
    routes: Vec<(RouteMethod, RouteArgs)>,
    pre: Vec<Installed>,
    layers: Vec<Installed>,
    inflight: InflightTracker,
    running: Option<Running>,
}

impl AxumBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identity: ServerIdentity::new(name),
            routes: Vec::new(),
            pre: Vec::new(),
            layers: Vec::new(),
            inflight: InflightTracker::new(),
            running: None,
        }
    }

    /// Compile everything registered so far into a router.
    pub fn compile(&self) -> Result<Router, ServerError> {
        // axum panics on conflicting routes; surface that as an error.
        std::panic::catch_unwind(AssertUnwindSafe(|| self.build_router())).map_err(|payload| {
            ServerError::InvalidPath {
                path: "<router>".to_string(),
                reason: panic_message(payload),
            }
        })
    }

    fn build_router(&self) -> Router {
        let mut by_path: BTreeMap<&str, MethodRouter> = BTreeMap::new();
        for (method, args) in &self.routes {
            let handler = args.handler.clone();
            let entry = by_path.remove(args.path.as_str()).unwrap_or_default();
            let entry = entry.on(method_filter(*method), move |req: Request| {
                let handler = handler.clone();
                async move { handler.call(req).await }
            });
            by_path.insert(args.path.as_str(), entry);
        }

        let mut router = by_path
            .into_iter()
            .fold(Router::new(), |router, (path, methods)| router.route(path, methods))
            .fallback(|| async { StatusCode::NOT_FOUND.into_response() });

        // The last layer added runs first, so apply in reverse.
        for installed in self.layers.iter().rev() {
            router = (installed.layer)(router);
        }

        if !self.pre.is_empty() {
            router = Router::new().fallback_service(router);
            for installed in self.pre.iter().rev() {
                router = (installed.layer)(router);
            }
        }

        router.layer(from_fn_with_state(self.inflight.clone(), track_inflight))
    }

    /// Names of installed middleware, `pre` first.
    pub fn middleware_names(&self) -> Vec<&str> {
        self.pre
            .iter()
            .chain(self.layers.iter())
            .map(|installed| installed.name.as_str())
            .collect()
    }
}

impl Default for AxumBackend {
    fn default() -> Self {
        Self::new("transom")
    }
}

impl Drop for AxumBackend {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.shutdown.trigger();
        }
    }
}

fn method_filter(method: RouteMethod) -> MethodFilter {
    match method {
        RouteMethod::Get => MethodFilter::GET,
        RouteMethod::Head => MethodFilter::HEAD,
        RouteMethod::Post => MethodFilter::POST,
        RouteMethod::Put => MethodFilter::PUT,
        RouteMethod::Patch => MethodFilter::PATCH,
        RouteMethod::Del => MethodFilter::DELETE,
        RouteMethod::Opts => MethodFilter::OPTIONS,
    }
}

/// Paths must be absolute and use `{name}` captures.
fn validate_path(path: &str) -> Result<(), ServerError> {
    let invalid = |reason: &str| ServerError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(invalid("use `{name}` or `{*name}` for captures"));
    }
    Ok(())
}

#[async_trait]
impl Backend for AxumBackend {
    fn framework(&self) -> &'static str {
        "axum"
    }

    fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut ServerIdentity {
        &mut self.identity
    }

    fn route(&mut self, method: RouteMethod, args: RouteArgs) -> Result<(), ServerError> {
        validate_path(&args.path)?;
        if self
            .routes
            .iter()
            .any(|(m, existing)| *m == method && existing.path == args.path)
        {
            return Err(ServerError::DuplicateRoute {
                method,
                path: args.path,
            });
        }
        self.routes.push((method, args));
        Ok(())
    }

    fn remove_route(&mut self, path: &str) -> bool {
        let before = self.routes.len();
        self.routes.retain(|(_, args)| args.path != path);
        self.routes.len() != before
    }

    fn routes(&self) -> Vec<(RouteMethod, String)> {
        self.routes
            .iter()
            .map(|(method, args)| (*method, args.path.clone()))
            .collect()
    }

    fn use_middleware(&mut self, middleware: Middleware) -> Result<(), ServerError> {
        let layer = middleware.prepare()?;
        self.layers.push(Installed {
            name: middleware.name().to_string(),
            layer,
        });
        Ok(())
    }

    fn pre(&mut self, middleware: Middleware) -> Result<(), ServerError> {
        let layer = middleware.prepare()?;
        self.pre.push(Installed {
            name: middleware.name().to_string(),
            layer,
        });
        Ok(())
    }

    fn middleware_count(&self) -> usize {
        self.pre.len() + self.layers.len()
    }

    async fn listen(&mut self, addr: SocketAddr) -> Result<SocketAddr, ServerError> {
        if let Some(running) = &self.running {
            return Err(ServerError::AlreadyListening(running.addr));
        }

        let app = self.compile()?;
        let listener = TcpListener::bind(addr).await.map_err(ServerError::Bind)?;
        let bound = listener.local_addr().map_err(ServerError::Bind)?;

        let shutdown = Shutdown::new();
        let signal = shutdown.signalled();
        let span = self.identity.log.clone();
        let task = tokio::spawn(
            async move { axum::serve(listener, app).with_graceful_shutdown(signal).await }
                .instrument(span),
        );

        self.identity.url = Some(format!("http://{bound}"));
        self.running = Some(Running {
            addr: bound,
            shutdown,
            task,
        });
        Ok(bound)
    }

    async fn close(&mut self) -> Result<(), ServerError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        running.shutdown.trigger();
        match running.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ServerError::Serve(err.to_string())),
            Err(err) => Err(ServerError::Serve(err.to_string())),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.addr)
    }

    fn inflight_requests(&self) -> u64 {
        self.inflight.current()
    }

    fn router(&self) -> Option<Result<Router, ServerError>> {
        Some(self.compile())
    }
}
