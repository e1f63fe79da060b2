//! Cookie parsing into [`RequestCookies`].

use std::collections::BTreeMap;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use percent_encoding::percent_decode_str;

use crate::config::schema::CookieParserOptions;

/// Cookies sent with the request, by name. Later duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCookies(pub BTreeMap<String, String>);

impl RequestCookies {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Parse one `Cookie` header value into `into`.
pub fn parse_cookie_header(value: &str, trim_quotes: bool, into: &mut BTreeMap<String, String>) {
    for pair in value.split(';') {
        let Some((name, raw)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let mut raw = raw.trim();
        if trim_quotes && raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            raw = &raw[1..raw.len() - 1];
        }
        // Percent-decoding only: `+` is a literal in cookie values.
        let decoded = percent_decode_str(raw).decode_utf8_lossy().into_owned();

        into.entry(name.to_string()).or_insert(decoded);
    }
}

pub async fn cookie_parser(
    State(opts): State<CookieParserOptions>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut cookies = BTreeMap::new();
    for value in req.headers().get_all(header::COOKIE) {
        if let Ok(value) = value.to_str() {
            parse_cookie_header(value, opts.trim_quotes, &mut cookies);
        }
    }
    req.extensions_mut().insert(RequestCookies(cookies));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_skips_junk() {
        let mut cookies = BTreeMap::new();
        parse_cookie_header(r#"sid=abc123; theme="dark"; junk; =x; note=a%20b"#, true, &mut cookies);
        assert_eq!(cookies.get("sid").map(String::as_str), Some("abc123"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(cookies.get("note").map(String::as_str), Some("a b"));
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn plus_and_padding_survive_decoding() {
        let mut cookies = BTreeMap::new();
        parse_cookie_header("token=ab+cd/ef==; enc=x%2By; eq=a=b", true, &mut cookies);
        assert_eq!(cookies["token"], "ab+cd/ef==");
        assert_eq!(cookies["enc"], "x+y");
        assert_eq!(cookies["eq"], "a=b");
    }

    #[test]
    fn first_value_wins() {
        let mut cookies = BTreeMap::new();
        parse_cookie_header("a=1; a=2", true, &mut cookies);
        assert_eq!(cookies["a"], "1");
    }

    #[test]
    fn quotes_kept_when_disabled() {
        let mut cookies = BTreeMap::new();
        parse_cookie_header(r#"q="x""#, false, &mut cookies);
        assert_eq!(cookies["q"], r#""x""#);
    }
}
