//! Request middleware and its registry-driven assembly.
//!
//! # Data Flow
//! ```text
//! Registry "transom-config.transom.<kind>"
//!     → assemble() (fixed order, falsy value skips the kind)
//!     → Server::pre / Server::use_middleware
//!     → Backend turns each Middleware into a router layer
//! ```
//!
//! Per-kind behavior lives in the submodules; this module owns the
//! [`Middleware`] value passed through the facade and the assembly pass.

pub mod cookies;
pub mod cors;
pub mod favicon;
pub mod headers;
pub mod locals;
pub mod logger;
pub mod params;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{from_fn, from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};
use tower_http::compression::CompressionLayer;

use crate::config::schema::{
    is_falsy, BodyParserOptions, CompressOptions, CookieParserOptions, CorsOptions,
    FaviconOptions, FullResponseOptions, MultipartOptions, QueryParserOptions,
    RequestLoggerOptions, UrlEncodedOptions,
};
use crate::config::{ConfigError, MiddlewareKind, ROOT_KEY};
use crate::error::TransomError;
use crate::registry::Registry;
use crate::server::{Server, ServerError};

type MiddlewareFn = dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync;

/// Transformation a backend applies to its router to install one middleware.
pub(crate) type RouterLayer = Arc<dyn Fn(Router) -> Router + Send + Sync>;

/// A named, user-supplied middleware function.
#[derive(Clone)]
pub struct CustomMiddleware {
    name: String,
    f: Arc<MiddlewareFn>,
}

impl fmt::Debug for CustomMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMiddleware")
            .field("name", &self.name)
            .finish()
    }
}

/// One middleware, as handed to `Server::use_middleware` or `Server::pre`.
#[derive(Debug, Clone)]
pub enum Middleware {
    RequestLogger(RequestLoggerOptions),
    /// Answers CORS preflight requests before routing.
    CorsPreflight(CorsOptions),
    Cors(CorsOptions),
    BodyParser(BodyParserOptions),
    Multipart(MultipartOptions),
    QueryParser(QueryParserOptions),
    UrlEncodedBodyParser(UrlEncodedOptions),
    CookieParser(CookieParserOptions),
    Compress(CompressOptions),
    FullResponse(FullResponseOptions),
    Favicon(FaviconOptions),
    /// Gives every request empty `Locals` and `Session` scratch maps.
    RequestLocals,
    Custom(CustomMiddleware),
}

impl Middleware {
    /// Wrap an async function as middleware.
    pub fn from_fn<F, Fut, R>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Middleware::Custom(CustomMiddleware {
            name: name.into(),
            f: Arc::new(move |req: Request, next: Next| {
                let fut = f(req, next);
                async move { fut.await.into_response() }.boxed()
            }),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Middleware::RequestLogger(_) => MiddlewareKind::RequestLogger.key(),
            Middleware::CorsPreflight(_) | Middleware::Cors(_) => MiddlewareKind::Cors.key(),
            Middleware::BodyParser(_) => MiddlewareKind::BodyParser.key(),
            Middleware::Multipart(_) => MiddlewareKind::Multipart.key(),
            Middleware::QueryParser(_) => MiddlewareKind::QueryParser.key(),
            Middleware::UrlEncodedBodyParser(_) => MiddlewareKind::UrlEncodedBodyParser.key(),
            Middleware::CookieParser(_) => MiddlewareKind::CookieParser.key(),
            Middleware::Compress(_) => MiddlewareKind::Compress.key(),
            Middleware::FullResponse(_) => MiddlewareKind::FullResponse.key(),
            Middleware::Favicon(_) => MiddlewareKind::Favicon.key(),
            Middleware::RequestLocals => "requestLocals",
            Middleware::Custom(custom) => &custom.name,
        }
    }

    /// Validate options and build the router transformation.
    ///
    /// Everything that can fail (bad header names, unreadable icon files,
    /// unknown log levels) fails here, at install time.
    pub(crate) fn prepare(&self) -> Result<RouterLayer, ServerError> {
        let fail = |reason: String| ServerError::Middleware {
            kind: self.name().to_string(),
            reason,
        };

        let layer: RouterLayer = match self.clone() {
            Middleware::RequestLogger(opts) => {
                let trace = logger::trace_layer(&opts).map_err(fail)?;
                Arc::new(move |router: Router| router.layer(trace.clone()))
            }
            Middleware::CorsPreflight(opts) => {
                let layer = cors::build_cors_layer(&opts).map_err(fail)?;
                Arc::new(move |router: Router| router.layer(from_fn_with_state(layer.clone(), cors::preflight)))
            }
            Middleware::Cors(opts) => {
                let layer = cors::build_cors_layer(&opts).map_err(fail)?;
                Arc::new(move |router: Router| router.layer(layer.clone()))
            }
            Middleware::BodyParser(opts) => {
                Arc::new(move |router: Router| router.layer(from_fn_with_state(opts.clone(), params::body_parser)))
            }
            Middleware::Multipart(opts) => {
                Arc::new(move |router: Router| router.layer(DefaultBodyLimit::max(opts.limit)))
            }
            Middleware::QueryParser(opts) => {
                Arc::new(move |router: Router| router.layer(from_fn_with_state(opts.clone(), params::query_parser)))
            }
            Middleware::UrlEncodedBodyParser(opts) => Arc::new(move |router: Router| {
                router.layer(from_fn_with_state(opts.clone(), params::urlencoded_parser))
            }),
            Middleware::CookieParser(opts) => {
                Arc::new(move |router: Router| router.layer(from_fn_with_state(opts.clone(), cookies::cookie_parser)))
            }
            Middleware::Compress(opts) => {
                let predicate = SizeAbove::new(opts.threshold)
                    .and(NotForContentType::GRPC)
                    .and(NotForContentType::IMAGES)
                    .and(NotForContentType::SSE);
                let compression = CompressionLayer::new().compress_when(predicate);
                Arc::new(move |router: Router| router.layer(compression.clone()))
            }
            Middleware::FullResponse(opts) => {
                let headers = headers::FullResponse::new(&opts).map_err(fail)?;
                Arc::new(move |router: Router| headers.apply(router))
            }
            Middleware::Favicon(opts) => {
                let icon = Arc::new(favicon::Favicon::load(&opts).map_err(fail)?);
                Arc::new(move |router: Router| router.layer(from_fn_with_state(icon.clone(), favicon::serve_favicon)))
            }
            Middleware::RequestLocals => Arc::new(|router: Router| router.layer(from_fn(locals::request_locals))),
            Middleware::Custom(custom) => Arc::new(move |router: Router| {
                let f = Arc::clone(&custom.f);
                router.layer(from_fn(move |req: Request, next: Next| (f)(req, next)))
            }),
        };
        Ok(layer)
    }
}

/// Install the built-in middleware configured under `transom-config.transom`.
///
/// Kinds are visited in [`MiddlewareKind::ALL`] order. An absent key installs
/// the kind with defaults, a falsy value skips it. `RequestLocals` is always
/// installed last.
pub fn assemble(server: &mut Server) -> Result<(), TransomError> {
    let registry = Arc::clone(server.registry());

    for kind in MiddlewareKind::ALL {
        let Some(value) = resolve_options(&registry, kind) else {
            tracing::debug!(middleware = %kind, "Middleware disabled");
            continue;
        };

        tracing::debug!(middleware = %kind, "Adding middleware");
        match kind {
            MiddlewareKind::RequestLogger => {
                server.use_middleware(Middleware::RequestLogger(parse(kind, value)?))?
            }
            MiddlewareKind::Cors => {
                let opts: CorsOptions = parse(kind, value)?;
                server.pre(Middleware::CorsPreflight(opts.clone()))?;
                server.use_middleware(Middleware::Cors(opts))?;
            }
            MiddlewareKind::BodyParser => {
                server.use_middleware(Middleware::BodyParser(parse(kind, value)?))?
            }
            MiddlewareKind::Multipart => {
                server.use_middleware(Middleware::Multipart(parse(kind, value)?))?
            }
            MiddlewareKind::QueryParser => {
                server.use_middleware(Middleware::QueryParser(parse(kind, value)?))?
            }
            MiddlewareKind::UrlEncodedBodyParser => {
                server.use_middleware(Middleware::UrlEncodedBodyParser(parse(kind, value)?))?
            }
            MiddlewareKind::CookieParser => {
                server.use_middleware(Middleware::CookieParser(parse(kind, value)?))?
            }
            MiddlewareKind::Compress => {
                server.use_middleware(Middleware::Compress(parse(kind, value)?))?
            }
            MiddlewareKind::FullResponse => {
                server.use_middleware(Middleware::FullResponse(parse(kind, value)?))?
            }
            MiddlewareKind::Favicon => {
                server.use_middleware(Middleware::Favicon(parse(kind, value)?))?
            }
        }
    }

    tracing::debug!("Initializing request locals and session");
    server.use_middleware(Middleware::RequestLocals)?;
    Ok(())
}

/// Options node for `kind`, or `None` when the kind is switched off.
fn resolve_options(registry: &Registry, kind: MiddlewareKind) -> Option<Value> {
    let value = registry
        .get(&kind.config_path())
        .or_else(|| {
            kind.legacy_key()
                .and_then(|legacy| registry.get(&format!("{ROOT_KEY}.transom.{legacy}")))
        })
        .unwrap_or_else(|| json!({}));

    if is_falsy(&value) {
        return None;
    }
    match value {
        Value::Object(_) => Some(value),
        // `true` and other truthy scalars mean "on, with defaults".
        _ => Some(json!({})),
    }
}

fn parse<T: DeserializeOwned>(kind: MiddlewareKind, value: Value) -> Result<T, ConfigError> {
    serde_json::from_value(value).map_err(|source| ConfigError::InvalidOptions {
        path: kind.config_path(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{MemoryBackend, Stage};

    fn server_with(options: Value) -> (Server, Arc<std::sync::Mutex<crate::server::backend::Recording>>) {
        let registry = Arc::new(Registry::new());
        registry.set(ROOT_KEY, options);
        let backend = MemoryBackend::new("test");
        let recording = backend.recording();
        (Server::wrap(backend, registry), recording)
    }

    #[test]
    fn absent_keys_install_defaults_in_order() {
        let (mut server, recording) = server_with(json!({}));
        assemble(&mut server).unwrap();

        let recording = recording.lock().unwrap();
        assert_eq!(recording.names(Stage::Pre), vec!["cors"]);
        assert_eq!(
            recording.names(Stage::Use),
            vec![
                "requestLogger",
                "cors",
                "bodyParser",
                "multipart",
                "queryParser",
                "urlEncodedBodyParser",
                "cookieParser",
                "compress",
                "fullResponse",
                "favicon",
                "requestLocals",
            ]
        );
    }

    #[test]
    fn falsy_values_disable() {
        let mut transom = serde_json::Map::new();
        for (i, kind) in MiddlewareKind::ALL.into_iter().enumerate() {
            let off = [json!(false), json!(null), json!(0), json!("")][i % 4].clone();
            transom.insert(kind.key().to_string(), off);
        }
        let (mut server, recording) = server_with(json!({ "transom": transom }));
        assemble(&mut server).unwrap();

        let recording = recording.lock().unwrap();
        assert_eq!(recording.count(Stage::Pre), 0);
        assert_eq!(recording.names(Stage::Use), vec!["requestLocals"]);
    }

    #[test]
    fn legacy_compress_key_is_honored() {
        let (mut server, recording) = server_with(json!({
            "transom": { "gzipResponse": false }
        }));
        assemble(&mut server).unwrap();
        assert!(!recording
            .lock()
            .unwrap()
            .names(Stage::Use)
            .contains(&"compress".to_string()));
    }

    #[test]
    fn options_reach_the_middleware() {
        let (mut server, recording) = server_with(json!({
            "transom": { "bodyParser": { "limit": 512 }, "cors": true }
        }));
        assemble(&mut server).unwrap();

        let recording = recording.lock().unwrap();
        let limit = recording.middleware.iter().find_map(|(_, m)| match m {
            Middleware::BodyParser(opts) => Some(opts.limit),
            _ => None,
        });
        assert_eq!(limit, Some(512));
    }

    #[test]
    fn malformed_options_fail() {
        let (mut server, _) = server_with(json!({
            "transom": { "bodyParser": { "limit": "lots" } }
        }));
        let err = assemble(&mut server).unwrap_err();
        assert!(matches!(
            err,
            TransomError::Config(ConfigError::InvalidOptions { ref path, .. })
                if path == "transom-config.transom.bodyParser"
        ));
    }

    #[test]
    fn every_variant_prepares_with_defaults() {
        let all = [
            Middleware::RequestLogger(Default::default()),
            Middleware::CorsPreflight(Default::default()),
            Middleware::Cors(Default::default()),
            Middleware::BodyParser(Default::default()),
            Middleware::Multipart(Default::default()),
            Middleware::QueryParser(Default::default()),
            Middleware::UrlEncodedBodyParser(Default::default()),
            Middleware::CookieParser(Default::default()),
            Middleware::Compress(Default::default()),
            Middleware::FullResponse(Default::default()),
            Middleware::Favicon(Default::default()),
            Middleware::RequestLocals,
            Middleware::from_fn("noop", |req, next: Next| next.run(req)),
        ];
        for middleware in all {
            let layer = middleware.prepare().unwrap();
            let _router: Router = layer(Router::new());
        }
    }

    #[test]
    fn bad_log_level_fails_at_install() {
        let opts = RequestLoggerOptions {
            level: "loud".to_string(),
            ..Default::default()
        };
        let err = Middleware::RequestLogger(opts).prepare().err().unwrap();
        assert!(matches!(err, ServerError::Middleware { ref kind, .. } if kind == "requestLogger"));
    }
}
