//! Per-request scratch storage.
//!
//! Every request gets its own empty [`Locals`] and [`Session`] before any
//! plugin-registered handler runs. Both are JSON maps shared by clones of the
//! handle, so a value set in middleware is visible in the handler.

use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::Request;
use axum::http::Extensions;
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{Map, Value};

/// Shared JSON map.
#[derive(Debug, Clone, Default)]
pub struct Scratch(Arc<RwLock<Map<String, Value>>>);

impl Scratch {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Request-scoped values set by middleware and handlers.
#[derive(Debug, Clone, Default)]
pub struct Locals(Scratch);

/// Request-scoped session values.
#[derive(Debug, Clone, Default)]
pub struct Session(Scratch);

impl Deref for Locals {
    type Target = Scratch;

    fn deref(&self) -> &Scratch {
        &self.0
    }
}

impl Deref for Session {
    type Target = Scratch;

    fn deref(&self) -> &Scratch {
        &self.0
    }
}

/// Insert empty `Locals` and `Session` unless already present.
pub fn ensure_request_locals(extensions: &mut Extensions) {
    extensions.get_or_insert_default::<Locals>();
    extensions.get_or_insert_default::<Session>();
}

pub async fn request_locals(mut req: Request, next: Next) -> Response {
    ensure_request_locals(req.extensions_mut());
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_and_session_are_separate() {
        let mut extensions = Extensions::new();
        ensure_request_locals(&mut extensions);

        let locals = extensions.get::<Locals>().cloned().unwrap();
        locals.set("user", "ada");

        let session = extensions.get::<Session>().unwrap();
        assert!(session.is_empty());
        assert_eq!(
            extensions.get::<Locals>().unwrap().get("user"),
            Some(Value::from("ada"))
        );
    }

    #[test]
    fn existing_values_are_kept() {
        let mut extensions = Extensions::new();
        ensure_request_locals(&mut extensions);
        extensions.get::<Session>().unwrap().set("sid", 7);

        ensure_request_locals(&mut extensions);
        assert_eq!(extensions.get::<Session>().unwrap().get("sid"), Some(Value::from(7)));
    }
}
