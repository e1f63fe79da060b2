//! Built-in plugins.

mod health;
mod route_logger;

pub use health::HealthCheck;
pub use route_logger::RouteLogger;
