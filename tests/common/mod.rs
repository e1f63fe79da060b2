//! Shared plugins and helpers for the integration suites.

#![allow(dead_code)]

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use transom_core::server::backend::Recording;
use transom_core::{MemoryBackend, Phase, Plugin, PluginError, PreStart, Server};

/// Shared call log: `"<plugin>:<phase>"` entries in call order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug)]
pub struct Boom(pub String);

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boom from {}", self.0)
    }
}

impl std::error::Error for Boom {}

/// Plugin that records its calls and can be told to fail or panic.
pub struct Recorder {
    pub name: String,
    pub log: CallLog,
    pub has_pre_start: bool,
    pub fail_in: Option<Phase>,
    pub panic_in: Option<Phase>,
    /// Options seen by each phase.
    pub seen_options: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            has_pre_start: true,
            fail_in: None,
            panic_in: None,
            seen_options: Arc::default(),
        }
    }

    pub fn without_pre_start(mut self) -> Self {
        self.has_pre_start = false;
        self
    }

    pub fn failing_in(mut self, phase: Phase) -> Self {
        self.fail_in = Some(phase);
        self
    }

    pub fn panicking_in(mut self, phase: Phase) -> Self {
        self.panic_in = Some(phase);
        self
    }

    fn record(&self, phase: Phase, options: &Value) -> Result<(), PluginError> {
        self.log.lock().unwrap().push(format!("{}:{phase}", self.name));
        self.seen_options.lock().unwrap().push(options.clone());
        if self.panic_in == Some(phase) {
            panic!("{} panicked", self.name);
        }
        if self.fail_in == Some(phase) {
            return Err(Box::new(Boom(self.name.clone())));
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, _server: &mut Server, options: &Value) -> Result<(), PluginError> {
        tokio::task::yield_now().await;
        self.record(Phase::Initialize, options)
    }

    fn as_pre_start(&self) -> Option<&dyn PreStart> {
        if self.has_pre_start {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl PreStart for Recorder {
    async fn pre_start(&self, _server: &mut Server, options: &Value) -> Result<(), PluginError> {
        tokio::task::yield_now().await;
        self.record(Phase::PreStart, options)
    }
}

pub fn new_log() -> CallLog {
    Arc::default()
}

pub fn entries(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn memory_backend() -> (MemoryBackend, Arc<Mutex<Recording>>) {
    let backend = MemoryBackend::new("test");
    let recording = backend.recording();
    (backend, recording)
}

/// Options with every built-in middleware switched off.
pub fn all_disabled() -> Value {
    json!({
        "transom": {
            "requestLogger": false,
            "cors": false,
            "bodyParser": false,
            "multipart": false,
            "queryParser": false,
            "urlEncodedBodyParser": false,
            "cookieParser": false,
            "compress": false,
            "fullResponse": false,
            "favicon": false,
            "suppressTimezoneWarning": true
        }
    })
}
