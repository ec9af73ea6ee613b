//! Media Configuration Controller Library
//!
//! Declarative configuration for Sonarr, Radarr, Lidarr, Readarr and
//! Prowlarr. Each instance is described by a namespaced custom resource;
//! the controller compiles the spec into a desired state, diffs it against
//! the live service and applies the difference through a per-service adapter.
//! Downstream services are optionally registered as applications with a
//! Prowlarr aggregator.
//!
//! ## Quick Start
//!
//! ```rust
//! use media_config_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod adapter;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
