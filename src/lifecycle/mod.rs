//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Runtime check → Timezone advisory → (core continues with config)
//!
//! Shutdown (shutdown.rs):
//!     close() → Trigger → Stop accepting → Drain in-flight requests
//! ```
//!
//! # Design Decisions
//! - Startup checks fail fast; the advisory never does
//! - Shutdown is graceful: in-flight requests finish before `close` returns

pub mod shutdown;
pub mod startup;
