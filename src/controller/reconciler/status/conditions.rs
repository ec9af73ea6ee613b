//! # Conditions
//!
//! Conditions are an ordered list keyed by type. [`upsert_condition`] is the
//! only way the engine modifies that list.

use crate::crd::Condition;

pub const READY: &str = "Ready";
pub const CONNECTED: &str = "Connected";
pub const SYNCED: &str = "Synced";

/// Reasons recorded on conditions
pub mod reasons {
    pub const SECRET_RESOLUTION_FAILED: &str = "SecretResolutionFailed";
    pub const ADAPTER_NOT_FOUND: &str = "AdapterNotFound";
    pub const CONNECTION_FAILED: &str = "ConnectionFailed";
    pub const CONNECTED: &str = "Connected";
    pub const CAPABILITY_DISCOVERY_FAILED: &str = "CapabilityDiscoveryFailed";
    pub const COMPILATION_FAILED: &str = "CompilationFailed";
    pub const STATE_FETCH_FAILED: &str = "StateFetchFailed";
    pub const DIFF_FAILED: &str = "DiffFailed";
    pub const APPLY_FAILED: &str = "ApplyFailed";
    pub const PARTIALLY_APPLIED: &str = "PartiallyApplied";
    pub const ALREADY_IN_SYNC: &str = "AlreadyInSync";
    pub const CHANGES_APPLIED: &str = "ChangesApplied";
    pub const RECONCILIATION_SUCCEEDED: &str = "ReconciliationSucceeded";
    pub const TIMEOUT: &str = "Timeout";
}

pub fn status_string(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// Replace the condition of the same type, or append it.
///
/// `last_transition_time` of an existing condition is kept when its status
/// does not change, so repeated identical passes leave it untouched.
pub fn upsert_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions
        .iter_mut()
        .find(|existing| existing.r#type == condition.r#type)
    {
        Some(existing) => {
            if existing.status == condition.status {
                condition
                    .last_transition_time
                    .clone_from(&existing.last_transition_time);
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(status: &str, reason: &str, at: &str) -> Condition {
        Condition {
            r#type: READY.to_string(),
            status: status.to_string(),
            observed_generation: Some(1),
            last_transition_time: Some(at.to_string()),
            reason: Some(reason.to_string()),
            message: None,
        }
    }

    #[test]
    fn test_same_status_keeps_transition_time() {
        let mut conditions = vec![condition("True", "A", "2026-01-01T00:00:00Z")];
        upsert_condition(&mut conditions, condition("True", "B", "2026-02-01T00:00:00Z"));

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].reason.as_deref(), Some("B"));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_status_flip_advances_transition_time() {
        let mut conditions = vec![condition("True", "A", "2026-01-01T00:00:00Z")];
        upsert_condition(&mut conditions, condition("False", "B", "2026-02-01T00:00:00Z"));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2026-02-01T00:00:00Z")
        );
    }

    #[test]
    fn test_new_type_is_appended_in_order() {
        let mut conditions = vec![condition("True", "A", "t")];
        let mut synced = condition("True", "A", "t");
        synced.r#type = SYNCED.to_string();
        upsert_condition(&mut conditions, synced);
        let types: Vec<_> = conditions.iter().map(|c| c.r#type.as_str()).collect();
        assert_eq!(types, vec![READY, SYNCED]);
    }
}
