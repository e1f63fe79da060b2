//! Backend that records calls instead of serving traffic.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::middleware::Middleware;
use crate::server::backend::{Backend, ServerIdentity};
use crate::server::handler::{RouteArgs, RouteMethod};
use crate::server::ServerError;

/// Where a middleware was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pre,
    Use,
}

/// Everything a [`MemoryBackend`] has been asked to do.
#[derive(Debug, Default)]
pub struct Recording {
    pub routes: Vec<(RouteMethod, RouteArgs)>,
    pub middleware: Vec<(Stage, Middleware)>,
    pub listening: Option<SocketAddr>,
    pub closed: bool,
}

impl Recording {
    pub fn count(&self, stage: Stage) -> usize {
        self.middleware.iter().filter(|(s, _)| *s == stage).count()
    }

    /// Names of middleware attached at `stage`, in attachment order.
    pub fn names(&self, stage: Stage) -> Vec<String> {
        self.middleware
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, m)| m.name().to_string())
            .collect()
    }
}

#[derive(Debug)]
pub struct MemoryBackend {
    identity: ServerIdentity,
    recording: Arc<Mutex<Recording>>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identity: ServerIdentity::new(name),
            recording: Arc::default(),
        }
    }

    /// Shared handle to the recording; stays valid after the backend moves.
    pub fn recording(&self) -> Arc<Mutex<Recording>> {
        Arc::clone(&self.recording)
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recording) -> T) -> T {
        let mut recording = self.recording.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut recording)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn framework(&self) -> &'static str {
        "memory"
    }

    fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut ServerIdentity {
        &mut self.identity
    }

    fn route(&mut self, method: RouteMethod, args: RouteArgs) -> Result<(), ServerError> {
        self.with(|r| r.routes.push((method, args)));
        Ok(())
    }

    fn remove_route(&mut self, path: &str) -> bool {
        self.with(|r| {
            let before = r.routes.len();
            r.routes.retain(|(_, args)| args.path != path);
            r.routes.len() != before
        })
    }

    fn routes(&self) -> Vec<(RouteMethod, String)> {
        self.with(|r| {
            r.routes
                .iter()
                .map(|(method, args)| (*method, args.path.clone()))
                .collect()
        })
    }

    fn use_middleware(&mut self, middleware: Middleware) -> Result<(), ServerError> {
        self.with(|r| r.middleware.push((Stage::Use, middleware)));
        Ok(())
    }

    fn pre(&mut self, middleware: Middleware) -> Result<(), ServerError> {
        self.with(|r| r.middleware.push((Stage::Pre, middleware)));
        Ok(())
    }

    fn middleware_count(&self) -> usize {
        self.with(|r| r.middleware.len())
    }

    async fn listen(&mut self, addr: SocketAddr) -> Result<SocketAddr, ServerError> {
        self.with(|r| match r.listening {
            Some(current) => Err(ServerError::AlreadyListening(current)),
            None => {
                r.listening = Some(addr);
                r.closed = false;
                Ok(addr)
            }
        })
    }

    async fn close(&mut self) -> Result<(), ServerError> {
        self.with(|r| {
            if r.listening.take().is_some() {
                r.closed = true;
            }
        });
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.with(|r| r.listening)
    }
}
