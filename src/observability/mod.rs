//! # Observability
//!
//! Observability modules for metrics and tracing.
//!
//! - `metrics`: Prometheus metrics collection
//! - `logging`: Subscriber setup for structured logs

pub mod metrics;
pub mod logging;

// Re-export for convenience
pub use metrics::*;
