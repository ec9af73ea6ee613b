//! # Status
//!
//! Condition bookkeeping and the per-pass status accumulator.

pub mod conditions;
mod tracker;

pub use conditions::{reasons, upsert_condition, CONNECTED, READY, SYNCED};
pub use tracker::StatusTracker;
