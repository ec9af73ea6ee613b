//! # List Command

use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::{Client, Resource, ResourceExt};
use media_config_controller::crd::ManagedResource;

/// Ready condition as a short column value
pub fn ready_column<K: ManagedResource>(resource: &K) -> &'static str {
    resource
        .service_status()
        .and_then(|s| s.condition("Ready"))
        .map(|c| if c.status == "True" { "True" } else { "False" })
        .unwrap_or("Unknown")
}

/// List all resources of kind `K`
pub async fn list_command<K: ManagedResource>(client: Client, namespace: Option<String>) -> Result<()> {
    let kind = K::kind(&());
    let api: Api<K> = if let Some(ns) = &namespace {
        println!("Listing {kind} resources in namespace '{ns}'...");
        Api::namespaced(client, ns)
    } else {
        println!("Listing {kind} resources in all namespaces...");
        Api::all(client)
    };

    let resources = api
        .list(&ListParams::default())
        .await
        .with_context(|| format!("Failed to list {kind} resources"))?;

    if resources.items.is_empty() {
        println!("No {kind} resources found.");
        return Ok(());
    }

    println!(
        "\n{:<30} {:<20} {:<9} {:<9} {:<12} {:<25}",
        "NAME", "NAMESPACE", "SUSPEND", "READY", "VERSION", "LAST RECONCILE"
    );
    println!("{}", "-".repeat(108));

    for resource in &resources.items {
        let name = resource.name_any();
        let ns = resource.namespace().unwrap_or_default();
        let suspend = if resource.is_suspended() { "Yes" } else { "No" };
        let ready = ready_column(resource);
        let status = resource.service_status();
        let version = status
            .and_then(|s| s.service_version.as_deref())
            .unwrap_or("-");
        let last = status
            .and_then(|s| s.last_reconcile_time.as_deref())
            .unwrap_or("-");

        println!("{name:<30} {ns:<20} {suspend:<9} {ready:<9} {version:<12} {last:<25}");
    }

    Ok(())
}
