//! # Configuration
//!
//! Runtime configuration for the controller process.

mod controller;
mod duration;

pub use controller::ControllerConfig;
pub use duration::{parse_kubernetes_duration, DurationError};
