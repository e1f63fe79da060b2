//! Hierarchical key-value registry.
//!
//! # Data Flow
//! ```text
//! TransomCore::new()
//!     → one Registry, wrapped in Arc
//!     → shared with the Server facade and every plugin
//!
//! "transom-config.definition.uri.prefix"
//!     → split on '.'
//!     → walk nested JSON objects
//! ```
//!
//! # Design Decisions
//! - Values are `serde_json::Value`, so any configuration tree fits
//! - `set` creates missing intermediate objects
//! - Readers get clones; the tree never leaks a lock guard

use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};

/// A dotted-path key-value store shared by reference between the core,
/// the server facade and plugins.
#[derive(Debug)]
pub struct Registry {
    root: RwLock<Value>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
        }
    }

    /// Get a clone of the value stored at `path`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        lookup(&root, path).cloned()
    }

    /// Get the value at `path`, or `default` when nothing is stored there.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).unwrap_or(default)
    }

    /// Get a string value at `path`.
    pub fn get_str(&self, path: &str) -> Option<String> {
        match self.get(path) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns true if a value is stored at `path`.
    pub fn has(&self, path: &str) -> bool {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        lookup(&root, path).is_some()
    }

    /// Store `value` at `path`, creating intermediate objects as needed.
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        let mut node = &mut *root;
        for segment in path.split('.') {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = match node {
                Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
                _ => unreachable!("node was just made an object"),
            };
        }
        *node = value.into();
    }

    /// Remove the value at `path`, returning it.
    pub fn remove(&self, path: &str) -> Option<Value> {
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        let (parent, key) = match path.rsplit_once('.') {
            Some((parent, key)) => (lookup_mut(&mut *root, parent)?, key),
            None => (&mut *root, path),
        };
        parent.as_object_mut()?.remove(key)
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

fn lookup_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(root, |node, segment| node.as_object_mut()?.get_mut(segment))
}
