//! Metrics emitted while a server is assembled.
//!
//! # Metrics
//! - `transom_routes_registered_total` (counter): routes by method
//! - `transom_middleware_installed_total` (counter): middleware by name
//! - `transom_plugin_phase_duration_seconds` (histogram): plugin phase latency
//! - `transom_plugin_failures_total` (counter): failed plugin phases

use std::time::Instant;

use metrics::{counter, histogram};

use crate::plugin::Phase;
use crate::server::RouteMethod;

pub fn record_route_registered(method: RouteMethod) {
    counter!("transom_routes_registered_total", "method" => method.verb()).increment(1);
}

pub fn record_middleware_installed(name: &str) {
    counter!("transom_middleware_installed_total", "middleware" => name.to_string()).increment(1);
}

pub fn record_plugin_phase(plugin: &str, phase: Phase, started: Instant, ok: bool) {
    let labels = [
        ("plugin", plugin.to_string()),
        ("phase", phase.to_string()),
    ];
    histogram!("transom_plugin_phase_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
    if !ok {
        counter!("transom_plugin_failures_total", &labels).increment(1);
    }
}
