//! # Reconcile Command
//!
//! Triggers a pass by stamping the reconcile-request annotation. Any metadata
//! change reaches the controller's watch; the new value is recorded in status
//! once handled.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource};
use media_config_controller::constants::RECONCILE_REQUEST_ANNOTATION;
use media_config_controller::crd::ManagedResource;
use serde_json::{json, Value};

/// Merge patch setting the reconcile-request annotation to `requested_at`
pub fn reconcile_patch(requested_at: &str) -> Value {
    json!({
        "metadata": {
            "annotations": {
                RECONCILE_REQUEST_ANNOTATION: requested_at
            }
        }
    })
}

pub async fn reconcile_command<K: ManagedResource>(
    client: Client,
    name: String,
    namespace: Option<String>,
) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let kind = K::kind(&());
    let api: Api<K> = Api::namespaced(client, ns);

    println!("Triggering reconciliation for {kind} '{ns}/{name}'...");

    let resource = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get {kind} '{ns}/{name}'"))?;

    if resource.is_suspended() {
        println!("   Warning: Resource is suspended. Reconciliation will be skipped.");
        println!(
            "   Use 'mcctl resume {} {name}' to resume reconciliation.",
            K::SERVICE_TYPE
        );
    }

    let requested_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    api.patch(
        &name,
        &PatchParams::default(),
        &Patch::Merge(reconcile_patch(&requested_at)),
    )
    .await
    .with_context(|| format!("Failed to trigger reconciliation for {kind} '{ns}/{name}'"))?;

    println!("Reconciliation triggered successfully");
    println!("   Annotation: {RECONCILE_REQUEST_ANNOTATION}={requested_at}");

    Ok(())
}
