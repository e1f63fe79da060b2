//! Route handlers and route-registration arguments.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use futures::future::{BoxFuture, FutureExt};

/// HTTP verbs the facade registers routes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Del,
    Opts,
}

impl RouteMethod {
    pub const ALL: [RouteMethod; 7] = [
        RouteMethod::Get,
        RouteMethod::Head,
        RouteMethod::Post,
        RouteMethod::Put,
        RouteMethod::Patch,
        RouteMethod::Del,
        RouteMethod::Opts,
    ];

    /// Verb name as used by the facade (`del`, `opts`).
    pub fn verb(self) -> &'static str {
        match self {
            RouteMethod::Get => "get",
            RouteMethod::Head => "head",
            RouteMethod::Post => "post",
            RouteMethod::Put => "put",
            RouteMethod::Patch => "patch",
            RouteMethod::Del => "del",
            RouteMethod::Opts => "opts",
        }
    }

    /// Event emitted when a route is registered with this verb.
    pub fn event_name(self) -> &'static str {
        match self {
            RouteMethod::Get => "transom.route.get",
            RouteMethod::Head => "transom.route.head",
            RouteMethod::Post => "transom.route.post",
            RouteMethod::Put => "transom.route.put",
            RouteMethod::Patch => "transom.route.patch",
            RouteMethod::Del => "transom.route.del",
            RouteMethod::Opts => "transom.route.opts",
        }
    }

    /// The HTTP method this verb maps to.
    pub fn http_method(self) -> Method {
        match self {
            RouteMethod::Get => Method::GET,
            RouteMethod::Head => Method::HEAD,
            RouteMethod::Post => Method::POST,
            RouteMethod::Put => Method::PUT,
            RouteMethod::Patch => Method::PATCH,
            RouteMethod::Del => Method::DELETE,
            RouteMethod::Opts => Method::OPTIONS,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.http_method())
    }
}

type HandlerFn = dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync;

/// A framework-neutral route handler: one request in, one response out.
///
/// Cloning shares the underlying function, so two clones compare equal
/// with [`RouteHandler::same_as`].
#[derive(Clone)]
pub struct RouteHandler(Arc<HandlerFn>);

impl RouteHandler {
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self(Arc::new(move |req: Request| {
            let fut = f(req);
            async move { fut.await.into_response() }.boxed()
        }))
    }

    /// Run the handler.
    pub fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        (self.0)(req)
    }

    /// True if both handles point at the same function.
    pub fn same_as(&self, other: &RouteHandler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RouteHandler")
    }
}

/// Shorthand for [`RouteHandler::new`].
pub fn handler<F, Fut, R>(f: F) -> RouteHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    RouteHandler::new(f)
}

/// Arguments of a route-registration call, passed to the backend unchanged
/// and carried as the payload of the route event.
#[derive(Debug, Clone)]
pub struct RouteArgs {
    pub path: String,
    pub handler: RouteHandler,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;

    #[test]
    fn event_names_follow_verbs() {
        for method in RouteMethod::ALL {
            assert_eq!(
                method.event_name(),
                format!("transom.route.{}", method.verb())
            );
        }
    }

    #[test]
    fn del_and_opts_map_to_http() {
        assert_eq!(RouteMethod::Del.http_method(), Method::DELETE);
        assert_eq!(RouteMethod::Opts.http_method(), Method::OPTIONS);
    }

    #[tokio::test]
    async fn handler_produces_response() {
        let h = handler(|_req| async { (StatusCode::CREATED, "made") });
        let res = h.call(Request::new(Body::empty())).await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let clone = h.clone();
        assert!(clone.same_as(&h));
        assert!(!handler(|_req| async { "other" }).same_as(&h));
    }
}
