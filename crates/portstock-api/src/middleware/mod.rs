//! # Middleware Stack
//!
//! Tower middleware for the web layer:
//! - [`tracing_layer`]: request/response tracing with `TraceLayer`.
//! - [`metrics`]: Prometheus request metrics and inventory gauges.
//! - [`rate_limit`]: sign-in failure throttling.
//!
//! Session handling lives in [`crate::auth`].

pub mod metrics;
pub mod rate_limit;
pub mod tracing_layer;
