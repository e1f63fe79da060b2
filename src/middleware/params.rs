//! Query string and request body parsing.
//!
//! Parsed values land in request extensions:
//! - [`RequestQuery`]: the query string
//! - [`RequestBody`]: a JSON or form body
//! - [`RequestParams`]: the merge of both when `mapParams` is on; the first
//!   source to set a key wins
//!
//! Bodies are read up to the configured limit and put back unchanged, so
//! handlers can still extract them.

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use crate::config::schema::{BodyParserOptions, QueryParserOptions, UrlEncodedOptions};

/// Query string values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestQuery(pub Map<String, Value>);

/// Parsed request body.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody(pub Value);

/// Query and body values merged into one map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams(pub Map<String, Value>);

/// Parse `a=1&b=2` pairs. Repeated keys, or keys ending in `[]`, collect
/// into arrays.
pub fn parse_pairs(input: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(input.as_bytes()) {
        let (key, forced_array) = match key.strip_suffix("[]") {
            Some(stripped) => (stripped.to_string(), true),
            None => (key.into_owned(), false),
        };
        let value = Value::String(value.into_owned());

        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None if forced_array => {
                map.insert(key, Value::Array(vec![value]));
            }
            None => {
                map.insert(key, value);
            }
        }
    }
    map
}

/// Copy entries of `source` whose keys `target` lacks.
pub fn merge_missing(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn map_params(req: &mut Request, values: &Map<String, Value>) {
    let params = req
        .extensions_mut()
        .get_or_insert_default::<RequestParams>();
    merge_missing(&mut params.0, values);
}

fn content_type_is(headers: &HeaderMap, predicate: impl Fn(&str) -> bool) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .is_some_and(|mime| predicate(&mime))
}

fn is_json(headers: &HeaderMap) -> bool {
    content_type_is(headers, |mime| mime == "application/json" || mime.ends_with("+json"))
}

fn is_form(headers: &HeaderMap) -> bool {
    content_type_is(headers, |mime| mime == "application/x-www-form-urlencoded")
}

/// Buffer the body up to `limit`, returning the bytes and a rebuilt request.
async fn buffer(req: Request, limit: usize) -> Result<(Bytes, Request), Response> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, limit).await.map_err(|_| {
        (StatusCode::PAYLOAD_TOO_LARGE, "request body exceeds the configured limit").into_response()
    })?;
    let req = Request::from_parts(parts, Body::from(bytes.clone()));
    Ok((bytes, req))
}

pub async fn query_parser(
    State(opts): State<QueryParserOptions>,
    mut req: Request,
    next: Next,
) -> Response {
    let query = req.uri().query().map(parse_pairs).unwrap_or_default();
    if opts.map_params {
        map_params(&mut req, &query);
    }
    req.extensions_mut().insert(RequestQuery(query));
    next.run(req).await
}

pub async fn body_parser(
    State(opts): State<BodyParserOptions>,
    req: Request,
    next: Next,
) -> Response {
    if !is_json(req.headers()) {
        return next.run(req).await;
    }

    let (bytes, mut req) = match buffer(req, opts.limit).await {
        Ok(buffered) => buffered,
        Err(res) => return res,
    };
    if bytes.is_empty() {
        return next.run(req).await;
    }

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, "Rejecting malformed JSON body");
            return (StatusCode::BAD_REQUEST, format!("invalid JSON body: {err}")).into_response();
        }
    };

    if opts.map_params {
        if let Value::Object(fields) = &value {
            map_params(&mut req, fields);
        }
    }
    req.extensions_mut().insert(RequestBody(value));
    next.run(req).await
}

pub async fn urlencoded_parser(
    State(opts): State<UrlEncodedOptions>,
    req: Request,
    next: Next,
) -> Response {
    if !is_form(req.headers()) {
        return next.run(req).await;
    }

    let (bytes, mut req) = match buffer(req, opts.limit).await {
        Ok(buffered) => buffered,
        Err(res) => return res,
    };
    let Ok(text) = std::str::from_utf8(&bytes) else {
        return (StatusCode::BAD_REQUEST, "form body is not valid UTF-8").into_response();
    };

    let fields = parse_pairs(text);
    if opts.map_params {
        map_params(&mut req, &fields);
    }
    req.extensions_mut().insert(RequestBody(Value::Object(fields)));
    next.run(req).await
}
