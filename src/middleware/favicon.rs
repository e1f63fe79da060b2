//! Serves `/favicon.ico`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::schema::FaviconOptions;

const FAVICON_PATH: &str = "/favicon.ico";
const BUNDLED_ICON: &[u8] = include_bytes!("../../assets/favicon.ico");

/// An icon loaded once at install time.
#[derive(Debug, Clone)]
pub struct Favicon {
    body: Bytes,
    cache_control: HeaderValue,
}

impl Favicon {
    /// Load the configured icon, or the bundled one when no path is set.
    pub fn load(opts: &FaviconOptions) -> Result<Self, String> {
        let body = match &opts.path {
            None => Bytes::from_static(BUNDLED_ICON),
            Some(path) => {
                let file: PathBuf = if path.is_dir() {
                    path.join(&opts.name)
                } else {
                    path.clone()
                };
                let data = std::fs::read(&file)
                    .map_err(|err| format!("cannot read {}: {err}", file.display()))?;
                Bytes::from(data)
            }
        };

        let cache_control = HeaderValue::from_str(&format!("public, max-age={}", opts.max_age))
            .map_err(|err| err.to_string())?;
        Ok(Self {
            body,
            cache_control,
        })
    }

    fn response(&self, with_body: bool) -> Response {
        let body = if with_body {
            Body::from(self.body.clone())
        } else {
            Body::empty()
        };
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("image/x-icon")),
                (header::CACHE_CONTROL, self.cache_control.clone()),
                (header::CONTENT_LENGTH, HeaderValue::from(self.body.len())),
            ],
            body,
        )
            .into_response()
    }
}

pub async fn serve_favicon(State(icon): State<Arc<Favicon>>, req: Request, next: Next) -> Response {
    if req.uri().path() != FAVICON_PATH {
        return next.run(req).await;
    }

    match *req.method() {
        Method::GET => icon.response(true),
        Method::HEAD => icon.response(false),
        Method::OPTIONS => (StatusCode::OK, [(header::ALLOW, "GET, HEAD, OPTIONS")]).into_response(),
        _ => (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD, OPTIONS")],
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_icon_is_an_ico() {
        let icon = Favicon::load(&FaviconOptions::default()).unwrap();
        assert_eq!(&icon.body[..4], &[0, 0, 1, 0]);
        assert_eq!(icon.cache_control, "public, max-age=3600");
    }

    #[test]
    fn directory_path_uses_name() {
        let dir = std::env::temp_dir().join(format!("transom-favicon-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("custom.ico"), b"icon").unwrap();

        let icon = Favicon::load(&FaviconOptions {
            path: Some(dir.clone()),
            name: "custom.ico".to_string(),
            max_age: 60,
        })
        .unwrap();
        assert_eq!(&icon.body[..], b"icon");

        std::fs::remove_dir_all(dir).unwrap_or_default();
    }

    #[test]
    fn missing_file_fails() {
        let opts = FaviconOptions {
            path: Some(PathBuf::from("/no/such/icon.ico")),
            ..Default::default()
        };
        assert!(Favicon::load(&opts).is_err());
    }
}
