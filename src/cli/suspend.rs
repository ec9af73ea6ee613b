//! # Suspend/Resume Commands

use anyhow::{Context, Result};
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource};
use media_config_controller::crd::ManagedResource;
use serde_json::{json, Value};

/// Merge patch toggling `spec.reconciliation.suspend`
pub fn suspend_patch(suspend: bool) -> Value {
    json!({
        "spec": {
            "reconciliation": {
                "suspend": suspend
            }
        }
    })
}

/// Suspend (`true`) or resume (`false`) reconciliation of one resource
pub async fn set_suspended<K: ManagedResource>(
    client: Client,
    name: String,
    namespace: Option<String>,
    suspend: bool,
) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let kind = K::kind(&());
    let verb = if suspend { "Suspending" } else { "Resuming" };

    println!("{verb} reconciliation for {kind} '{ns}/{name}'...");

    let api: Api<K> = Api::namespaced(client, ns);
    let resource = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get {kind} '{ns}/{name}'"))?;

    if resource.is_suspended() == suspend {
        let state = if suspend { "suspended" } else { "active (not suspended)" };
        println!("   Resource is already {state}");
        return Ok(());
    }

    api.patch(&name, &PatchParams::default(), &Patch::Merge(suspend_patch(suspend)))
        .await
        .with_context(|| format!("Failed to update {kind} '{ns}/{name}'"))?;

    if suspend {
        println!("Reconciliation suspended successfully");
        println!("\nTo resume reconciliation, run:");
        println!("   mcctl resume {} {name} --namespace {ns}", K::SERVICE_TYPE);
    } else {
        println!("Reconciliation resumed successfully");
        println!("\nThe controller will reconcile this resource shortly.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspend_patch_targets_reconciliation_block() {
        assert_eq!(suspend_patch(true)["spec"]["reconciliation"]["suspend"], json!(true));
        assert_eq!(suspend_patch(false)["spec"]["reconciliation"]["suspend"], json!(false));
    }
}
