//! Standard response headers: request id, response time and configured extras.

use std::time::Instant;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::schema::FullResponseOptions;

pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

/// Validated header settings.
#[derive(Debug, Clone)]
pub struct FullResponse {
    extra: Vec<(HeaderName, HeaderValue)>,
    request_id: bool,
}

impl FullResponse {
    pub fn new(opts: &FullResponseOptions) -> Result<Self, String> {
        let extra = opts
            .headers
            .iter()
            .map(|(name, value)| {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| format!("invalid header name {name:?}"))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|_| format!("invalid value for header {name}"))?;
                Ok((name, value))
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(Self {
            extra,
            request_id: opts.request_id,
        })
    }

    /// Layer the headers onto `router`. Headers a handler already set win.
    pub fn apply(&self, router: Router) -> Router {
        let mut router = router.layer(from_fn(response_time));
        for (name, value) in &self.extra {
            router = router.layer(SetResponseHeaderLayer::if_not_present(
                name.clone(),
                value.clone(),
            ));
        }
        if self.request_id {
            router = router
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));
        }
        router
    }
}

async fn response_time(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut res = next.run(req).await;
    let millis = start.elapsed().as_millis().to_string();
    if let Ok(value) = HeaderValue::from_str(&millis) {
        res.headers_mut()
            .insert(HeaderName::from_static(RESPONSE_TIME_HEADER), value);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn rejects_invalid_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("bad name".to_string(), "x".to_string());
        let opts = FullResponseOptions {
            headers,
            request_id: true,
        };
        assert!(FullResponse::new(&opts).is_err());
    }

    #[test]
    fn accepts_extra_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("x-powered-by".to_string(), "transom".to_string());
        let full = FullResponse::new(&FullResponseOptions {
            headers,
            request_id: false,
        })
        .unwrap();
        assert_eq!(full.extra.len(), 1);
        assert_eq!(full.extra[0].0, "x-powered-by");
    }
}
