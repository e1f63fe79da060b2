//! Named lifecycle events published by the server facade.
//!
//! Delivery is synchronous and ordered: listeners run in subscription order
//! on the caller's task, before the facade delegates to the backend.

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::server::handler::{RouteArgs, RouteMethod};

/// Event emitted by `Server::rm`.
pub const ROUTE_REMOVED_EVENT: &str = "transom.route.rm";
/// Event emitted once the server is accepting connections.
pub const LISTENING_EVENT: &str = "listening";
/// Event emitted after the server stopped.
pub const CLOSE_EVENT: &str = "close";

/// An event and its payload.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A route-registration verb was called.
    Route { method: RouteMethod, args: RouteArgs },
    /// `rm` was called for this path.
    RouteRemoved { path: String },
    /// The server is listening on this address.
    Listening { addr: SocketAddr },
    /// The server stopped listening.
    Closed,
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Route { method, .. } => method.event_name(),
            ServerEvent::RouteRemoved { .. } => ROUTE_REMOVED_EVENT,
            ServerEvent::Listening { .. } => LISTENING_EVENT,
            ServerEvent::Closed => CLOSE_EVENT,
        }
    }
}

type Listener = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Publish/subscribe hub keyed by event name.
#[derive(Default, Clone)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<(String, Listener)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to events named `event`.
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event.into(), Arc::new(listener)));
    }

    /// Deliver `event` to its subscribers. Returns how many were called.
    pub fn emit(&self, event: &ServerEvent) -> usize {
        // Snapshot so listeners may subscribe further without deadlocking.
        let matching: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(name, _)| name == event.name())
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &matching {
            listener(event);
        }
        matching.len()
    }

    /// Number of subscribers for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(name, _)| name == event)
            .count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("EventBus").field("listeners", &count).finish()
    }
}
