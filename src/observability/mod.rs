//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Core, facade and middleware produce:
//!     → logging.rs (subscriber setup for structured tracing events)
//!     → metrics.rs (counters and histograms through the `metrics` facade)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → whatever metrics recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing subscribers and recorders is left
//!   to binaries
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
