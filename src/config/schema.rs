//! Configuration schema definitions.
//!
//! Registry keys and the typed option structs for each built-in middleware.
//! All structs deserialize from the camelCase JSON the API definition uses;
//! restify/fastify spellings are accepted as aliases.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root registry key holding the full options tree.
pub const ROOT_KEY: &str = "transom-config";

/// Registry key of the application URI prefix.
pub const URI_PREFIX_KEY: &str = "transom-config.definition.uri.prefix";

/// Prefix used when the definition does not set one.
pub const DEFAULT_URI_PREFIX: &str = "/api/v1";

/// Registry key of the timezone warning switch.
pub const SUPPRESS_TIMEZONE_WARNING_KEY: &str = "transom-config.transom.suppressTimezoneWarning";

/// Built-in middleware kinds, in the order they are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiddlewareKind {
    RequestLogger,
    Cors,
    BodyParser,
    Multipart,
    QueryParser,
    UrlEncodedBodyParser,
    CookieParser,
    Compress,
    FullResponse,
    Favicon,
}

impl MiddlewareKind {
    /// Every configurable kind, in installation order.
    pub const ALL: [MiddlewareKind; 10] = [
        MiddlewareKind::RequestLogger,
        MiddlewareKind::Cors,
        MiddlewareKind::BodyParser,
        MiddlewareKind::Multipart,
        MiddlewareKind::QueryParser,
        MiddlewareKind::UrlEncodedBodyParser,
        MiddlewareKind::CookieParser,
        MiddlewareKind::Compress,
        MiddlewareKind::FullResponse,
        MiddlewareKind::Favicon,
    ];

    /// Key below `transom-config.transom`.
    pub fn key(self) -> &'static str {
        match self {
            MiddlewareKind::RequestLogger => "requestLogger",
            MiddlewareKind::Cors => "cors",
            MiddlewareKind::BodyParser => "bodyParser",
            MiddlewareKind::Multipart => "multipart",
            MiddlewareKind::QueryParser => "queryParser",
            MiddlewareKind::UrlEncodedBodyParser => "urlEncodedBodyParser",
            MiddlewareKind::CookieParser => "cookieParser",
            MiddlewareKind::Compress => "compress",
            MiddlewareKind::FullResponse => "fullResponse",
            MiddlewareKind::Favicon => "favicon",
        }
    }

    /// Older spelling of the key, still honored when the current one is absent.
    pub fn legacy_key(self) -> Option<&'static str> {
        match self {
            MiddlewareKind::Compress => Some("gzipResponse"),
            _ => None,
        }
    }

    /// Full registry path of this kind's options node.
    pub fn config_path(self) -> String {
        format!("{ROOT_KEY}.transom.{}", self.key())
    }
}

impl std::fmt::Display for MiddlewareKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// JavaScript-style falsiness, used to switch middleware off with `false`.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Request logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestLoggerOptions {
    /// Name recorded on every request span.
    pub name: String,

    /// Level of the per-response log line (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for RequestLoggerOptions {
    fn default() -> Self {
        Self {
            name: "transom".to_string(),
            level: "info".to_string(),
        }
    }
}

/// Cross-origin resource sharing.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorsOptions {
    /// Allowed origins. Empty or `"*"` allows any origin.
    #[serde(alias = "origin")]
    pub origins: Vec<String>,

    /// Allowed request headers. Empty mirrors the preflight request.
    #[serde(alias = "allowedHeaders")]
    pub allow_headers: Vec<String>,

    /// Response headers exposed to the browser.
    #[serde(alias = "exposedHeaders")]
    pub expose_headers: Vec<String>,

    /// Allowed methods. Empty means the common REST verbs.
    pub methods: Vec<String>,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub credentials: bool,

    /// Preflight cache duration in seconds.
    #[serde(alias = "preflightMaxAge")]
    pub max_age: Option<u64>,
}

/// JSON body parsing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BodyParserOptions {
    /// Maximum body size in bytes.
    #[serde(alias = "bodyLimit", alias = "maxBodySize")]
    pub limit: usize,

    /// Copy top-level fields into the request params.
    pub map_params: bool,
}

impl Default for BodyParserOptions {
    fn default() -> Self {
        Self {
            limit: 20_000,
            map_params: true,
        }
    }
}

/// Multipart uploads.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MultipartOptions {
    /// Maximum multipart body size in bytes.
    #[serde(alias = "fileSize")]
    pub limit: usize,
}

impl Default for MultipartOptions {
    fn default() -> Self {
        Self {
            limit: 10 * 1024 * 1024,
        }
    }
}

/// Query string parsing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryParserOptions {
    /// Copy parsed query values into the request params.
    pub map_params: bool,
}

impl Default for QueryParserOptions {
    fn default() -> Self {
        Self { map_params: true }
    }
}

/// `application/x-www-form-urlencoded` body parsing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UrlEncodedOptions {
    /// Maximum body size in bytes.
    #[serde(alias = "bodyLimit")]
    pub limit: usize,

    /// Copy form fields into the request params.
    pub map_params: bool,
}

impl Default for UrlEncodedOptions {
    fn default() -> Self {
        Self {
            limit: 20_000,
            map_params: true,
        }
    }
}

/// Cookie parsing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CookieParserOptions {
    /// Strip one pair of surrounding double quotes from values.
    pub trim_quotes: bool,
}

impl Default for CookieParserOptions {
    fn default() -> Self {
        Self { trim_quotes: true }
    }
}

/// Response compression.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressOptions {
    /// Responses smaller than this many bytes are sent uncompressed.
    pub threshold: u16,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self { threshold: 1024 }
    }
}

/// Extra response headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FullResponseOptions {
    /// Headers added to every response that does not already carry them.
    pub headers: BTreeMap<String, String>,

    /// Generate and echo `x-request-id`.
    pub request_id: bool,
}

impl Default for FullResponseOptions {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            request_id: true,
        }
    }
}

/// Favicon serving.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaviconOptions {
    /// Icon file, or a directory holding `name`. Unset serves the bundled icon.
    pub path: Option<PathBuf>,

    /// File name looked up when `path` is a directory.
    pub name: String,

    /// `Cache-Control` max-age in seconds.
    pub max_age: u64,
}

impl Default for FaviconOptions {
    fn default() -> Self {
        Self {
            path: None,
            name: "favicon.ico".to_string(),
            max_age: 3600,
        }
    }
}
