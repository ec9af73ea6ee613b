//! # Lifecycle
//!
//! Two-phase deletion as an explicit state machine. `Gone` is never observed
//! by a pass; it shows up as "not found" at fetch time.

use crate::crd::ManagedResource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No finalizer yet; the only permitted work is adding it
    Unfinalized,
    /// Finalizer present, not being deleted
    Active,
    /// Deletion timestamp set; cleanup then finalizer removal
    Deleting,
}

impl LifecycleState {
    pub fn of<K: ManagedResource>(resource: &K) -> Self {
        if resource.is_being_deleted() {
            Self::Deleting
        } else if resource.has_finalizer() {
            Self::Active
        } else {
            Self::Unfinalized
        }
    }
}
