//! # Status Command
//!
//! Command to show detailed status of one resource.

use anyhow::{Context, Result};
use kube::api::Api;
use kube::{Client, Resource, ResourceExt};
use media_config_controller::crd::ManagedResource;

/// Show detailed status of a resource of kind `K`
pub async fn status_command<K: ManagedResource>(
    client: Client,
    name: String,
    namespace: Option<String>,
) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");
    let kind = K::kind(&());

    println!("Status for {kind} '{ns}/{name}'");
    println!();

    let api: Api<K> = Api::namespaced(client, ns);
    let resource = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get {kind} '{ns}/{name}'"))?;

    println!("Resource Information:");
    println!("  Name: {}", resource.name_any());
    println!("  Namespace: {}", resource.namespace().unwrap_or_default());
    if let Some(generation) = resource.meta().generation {
        println!("  Generation: {}", generation);
    }

    println!();
    println!("Spec:");
    println!("  URL: {}", resource.connection().url);
    println!("  Suspend: {}", resource.is_suspended());
    if let Some(interval) = resource.reconciliation().and_then(|r| r.interval.as_deref()) {
        println!("  Reconcile Interval: {}", interval);
    }
    if let Some(aggregator) = resource.aggregator_ref() {
        println!(
            "  Aggregator: {} (auto-register: {})",
            aggregator.name, aggregator.auto_register
        );
    }

    let Some(status) = resource.service_status() else {
        println!();
        println!("Status: No status available (resource may not have been reconciled yet)");
        return Ok(());
    };

    println!();
    println!("Status:");
    println!("  Connected: {}", status.connected);
    if let Some(version) = &status.service_version {
        println!("  Service Version: {}", version);
    }
    if let Some(observed_generation) = status.observed_generation {
        println!("  Observed Generation: {}", observed_generation);
    }
    if let Some(last) = &status.last_reconcile_time {
        println!("  Last Reconcile Time: {}", last);
    }
    if let Some(next) = &status.next_reconcile_time {
        println!("  Next Reconcile Time: {}", next);
    }
    if let Some(hash) = &status.last_applied_hash {
        println!("  Last Applied Hash: {}", hash);
    }

    if let Some(health) = &status.health {
        println!();
        println!(
            "Health: {} issue(s) ({} error, {} warning, {} notice)",
            health.issue_count, health.errors, health.warnings, health.notices
        );
        for issue in &health.issues {
            println!("  [{}] {}: {}", issue.severity, issue.source, issue.message);
        }
    }

    if let Some(registration) = &status.registration {
        println!();
        println!("Registration:");
        println!("  Registered: {}", registration.registered);
        if let Some(aggregator) = &registration.aggregator_name {
            println!("  Aggregator: {}", aggregator);
        }
        if let Some(message) = &registration.message {
            println!("  Message: {}", message);
        }
        if let Some(last_sync) = &registration.last_sync_time {
            println!("  Last Sync: {}", last_sync);
        }
    }

    if !status.conditions.is_empty() {
        println!();
        println!("Conditions:");
        for condition in &status.conditions {
            println!("  {}: {}", condition.r#type, condition.status);
            if let Some(reason) = &condition.reason {
                println!("    Reason: {}", reason);
            }
            if let Some(message) = &condition.message {
                println!("    Message: {}", message);
            }
            if let Some(last_transition_time) = &condition.last_transition_time {
                println!("    Last Transition: {}", last_transition_time);
            }
        }
    }

    Ok(())
}
