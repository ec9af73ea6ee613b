//! Name-keyed diff between observed and desired state.
//!
//! Items are matched by name within a kind. Unsupported kinds are skipped
//! entirely, so a change set never touches something the backend cannot do.
//! Only owned items are deleted.

use crate::adapter::types::{
    Capabilities, Change, ChangeSet, ConfigItem, DesiredState, ObservedItem, ObservedState,
    Ownership, ResourceKind,
};
use std::collections::{HashMap, HashSet};

/// Compute the minimal change set turning `observed` into `desired`
pub fn diff_states(
    observed: &ObservedState,
    desired: &DesiredState,
    capabilities: &Capabilities,
    owned: &Ownership,
) -> ChangeSet {
    let mut changes = Vec::new();
    for kind in ResourceKind::ALL {
        if !capabilities.supports(kind) {
            continue;
        }
        diff_kind(
            kind,
            observed.items(kind),
            desired.items(kind),
            owned,
            &mut changes,
        );
    }
    ChangeSet::new(changes)
}

fn diff_kind(
    kind: ResourceKind,
    observed: &[ObservedItem],
    desired: &[ConfigItem],
    owned: &Ownership,
    changes: &mut Vec<Change>,
) {
    let mut by_name: HashMap<&str, &ObservedItem> = HashMap::with_capacity(observed.len());
    for existing in observed {
        by_name.entry(existing.item.name.as_str()).or_insert(existing);
    }

    for item in desired {
        match by_name.get(item.name.as_str()) {
            None => changes.push(Change::Create {
                kind,
                item: item.clone(),
            }),
            Some(existing) if !item.is_satisfied_by(&existing.item) => {
                changes.push(Change::Update {
                    kind,
                    id: existing.id,
                    item: item.clone(),
                });
            }
            Some(_) => {}
        }
    }

    let wanted: HashSet<&str> = desired.iter().map(|i| i.name.as_str()).collect();
    for existing in observed {
        let name = existing.item.name.as_str();
        if !wanted.contains(name) && owned.owns(kind, name) {
            changes.push(Change::Delete {
                kind,
                id: existing.id,
                name: existing.item.name.clone(),
            });
        }
    }
}
