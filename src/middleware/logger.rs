//! Per-request logging.

use std::str::FromStr;

use axum::http::Request;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, MakeSpan, TraceLayer};
use tracing::{Level, Span};

use crate::config::schema::RequestLoggerOptions;

/// Opens one span per request, tagged with the server name.
#[derive(Debug, Clone)]
pub struct RequestSpan {
    name: String,
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, req: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            server = %self.name,
            method = %req.method(),
            uri = %req.uri(),
        )
    }
}

pub type RequestTraceLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, DefaultOnRequest, DefaultOnResponse>;

pub fn trace_layer(opts: &RequestLoggerOptions) -> Result<RequestTraceLayer, String> {
    let level = Level::from_str(&opts.level)
        .map_err(|_| format!("unknown log level {:?}", opts.level))?;

    Ok(TraceLayer::new_for_http()
        .make_span_with(RequestSpan {
            name: opts.name.clone(),
        })
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        for level in ["trace", "DEBUG", "info", "Warn", "error"] {
            let opts = RequestLoggerOptions {
                level: level.to_string(),
                ..Default::default()
            };
            assert!(trace_layer(&opts).is_ok(), "{level}");
        }
    }
}
