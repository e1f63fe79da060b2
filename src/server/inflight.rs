//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests between arrival and response
//! - Expose the count for `Server::inflight_requests`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// Shared counter of requests currently being served.
#[derive(Debug, Clone, Default)]
pub struct InflightTracker {
    count: Arc<AtomicU64>,
}

impl InflightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request. The returned guard decrements on drop.
    pub fn track(&self) -> InflightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InflightGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn current(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight count when dropped.
#[derive(Debug)]
pub struct InflightGuard {
    count: Arc<AtomicU64>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Outermost middleware: holds a guard for the lifetime of each request.
pub async fn track_inflight(
    State(tracker): State<InflightTracker>,
    req: Request,
    next: Next,
) -> Response {
    let _guard = tracker.track();
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_decrements_on_drop() {
        let tracker = InflightTracker::new();
        let first = tracker.track();
        let second = tracker.track();
        assert_eq!(tracker.current(), 2);
        drop(first);
        assert_eq!(tracker.current(), 1);
        drop(second);
        assert_eq!(tracker.current(), 0);
    }
}
