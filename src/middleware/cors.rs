//! Cross-origin resource sharing.
//!
//! Preflight requests are answered by [`preflight`] before routing, so a
//! preflight for a path with no OPTIONS route still succeeds. Actual requests
//! get their CORS headers from the plain `CorsLayer` installed with `use`.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower::{service_fn, Layer, ServiceExt};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};

use crate::config::schema::CorsOptions;

const DEFAULT_METHODS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build a `CorsLayer` from options.
///
/// With `credentials` set, a wildcard origin mirrors the request origin
/// instead, since browsers reject `*` on credentialed requests.
pub fn build_cors_layer(opts: &CorsOptions) -> Result<CorsLayer, String> {
    let any_origin = opts.origins.is_empty() || opts.origins.iter().any(|o| o == "*");
    let origin = match (any_origin, opts.credentials) {
        (true, false) => AllowOrigin::from(Any),
        (true, true) => AllowOrigin::mirror_request(),
        (false, _) => AllowOrigin::list(
            opts.origins
                .iter()
                .map(|o| HeaderValue::from_str(o).map_err(|_| format!("invalid origin {o:?}")))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };

    let methods = if opts.methods.is_empty() {
        DEFAULT_METHODS.to_vec()
    } else {
        opts.methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| format!("invalid method {m:?}"))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let allow_headers = if opts.allow_headers.is_empty() {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(header_names(&opts.allow_headers)?)
    };

    let mut layer = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::list(methods))
        .allow_headers(allow_headers);

    if !opts.expose_headers.is_empty() {
        layer = layer.expose_headers(ExposeHeaders::list(header_names(&opts.expose_headers)?));
    }
    if opts.credentials {
        layer = layer.allow_credentials(true);
    }
    if let Some(secs) = opts.max_age {
        layer = layer.max_age(Duration::from_secs(secs));
    }
    Ok(layer)
}

fn header_names(names: &[String]) -> Result<Vec<HeaderName>, String> {
    names
        .iter()
        .map(|n| HeaderName::from_bytes(n.as_bytes()).map_err(|_| format!("invalid header name {n:?}")))
        .collect()
}

/// `OPTIONS` with both `Origin` and `Access-Control-Request-Method`.
pub fn is_preflight(req: &Request) -> bool {
    req.method() == Method::OPTIONS
        && req.headers().contains_key(header::ORIGIN)
        && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// Answer preflight requests; pass everything else on.
pub async fn preflight(State(cors): State<CorsLayer>, req: Request, next: Next) -> Response {
    if !is_preflight(&req) {
        return next.run(req).await;
    }

    let service = cors.layer(service_fn(|_req: Request| async {
        Ok::<_, Infallible>(StatusCode::NO_CONTENT.into_response())
    }));
    match service.oneshot(req).await {
        Ok(res) => res,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn credentials_with_wildcard_does_not_panic() {
        let opts = CorsOptions {
            origins: vec!["*".to_string()],
            credentials: true,
            ..Default::default()
        };
        // CorsLayer validates its settings when it wraps a service.
        let layer = build_cors_layer(&opts).unwrap();
        let _svc = layer.layer(service_fn(|_req: Request| async {
            Ok::<_, Infallible>(StatusCode::OK.into_response())
        }));
    }

    #[test]
    fn rejects_bad_header_names() {
        let opts = CorsOptions {
            allow_headers: vec!["bad header".to_string()],
            ..Default::default()
        };
        assert!(build_cors_layer(&opts).is_err());
    }

    #[test]
    fn recognizes_preflight() {
        let req = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .header(header::ORIGIN, "https://app.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        assert!(is_preflight(&req));

        let plain = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .body(Body::empty())
            .unwrap();
        assert!(!is_preflight(&plain));
    }
}
