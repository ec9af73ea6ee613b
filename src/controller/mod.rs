//! # Controller
//!
//! Core controller modules for the media configuration controller.
//!
//! - `events`: Kubernetes events against managed resources
//! - `reconciler`: Per-resource reconciliation engine
//! - `registration`: Aggregator registration coordinator
//! - `secrets`: Secret reference resolution
//! - `server`: HTTP server for metrics and health checks
//! - `store`: Resource reads, finalizer and status writes

pub mod events;
pub mod reconciler;
pub mod registration;
pub mod secrets;
pub mod server;
pub mod store;
