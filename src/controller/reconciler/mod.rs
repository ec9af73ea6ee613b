//! # Reconciler
//!
//! The per-resource reconciliation engine shared by every managed kind.
//!
//! ## Reconciliation Flow
//!
//! 1. Re-read the resource; a missing object is already gone
//! 2. Suspended resources are left alone
//! 3. Add the finalizer on the first pass
//! 4. On deletion: unregister, clean up the backend, drop the finalizer
//! 5. Otherwise: resolve secrets, connect, discover, compile, diff, apply
//! 6. Persist status and schedule the next pass

pub mod lifecycle;
pub mod reconcile;
pub mod status;
pub mod types;

// Re-export public API
pub use lifecycle::LifecycleState;
pub use reconcile::reconcile;
pub use types::{Reconciler, ReconcilerError, TriggerSource};
