//! # Runtime
//!
//! Process bootstrap, the controller watch loops and their error policy.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, ControllerContexts, InitializationResult};
pub use watch_loop::{run_watch_loop, should_reconcile, WatchDecision};
