//! # Deletion Cleanup
//!
//! Runs while a resource carries its finalizer and a deletion timestamp.
//! Every step here is best-effort: failures are logged and the finalizer is
//! removed regardless, so a broken backend never blocks deletion.

use crate::adapter::{DesiredState, Ownership};
use crate::controller::reconciler::reconcile::steps::{
    adapter_for, connection_descriptor, StepError,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::registration::client_for_aggregator;
use crate::controller::secrets::resolve_all;
use crate::crd::ManagedResource;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

pub async fn finalize_deletion<K: ManagedResource>(
    resource: &K,
    ctx: &Reconciler<K>,
) -> Result<Action, ReconcilerError> {
    let name = resource.name_any();
    info!("Cleaning up before deletion");

    let cleanup = async {
        unregister_from_aggregators(resource, ctx).await;
        if let Err(e) = remove_managed_items(resource, ctx).await {
            warn!(error = %e, reason = e.reason(), "Backend cleanup failed, continuing with deletion");
        }
    };
    if tokio::time::timeout(ctx.config.reconcile_timeout_duration(), cleanup)
        .await
        .is_err()
    {
        warn!("Cleanup timed out, continuing with deletion");
    }

    ctx.store
        .remove_finalizer(resource, K::FINALIZER)
        .await
        .map_err(ReconcilerError::Finalizer)?;
    info!(resource.name = %name, "Finalizer removed");
    Ok(Action::await_change())
}

/// Aggregators this resource may be registered with: the one it references
/// now and the one it was last registered with
fn aggregator_targets<K: ManagedResource>(resource: &K) -> BTreeSet<String> {
    let mut targets = BTreeSet::new();
    if let Some(reference) = resource.aggregator_ref() {
        targets.insert(reference.name.clone());
    }
    if let Some(previous) = resource
        .service_status()
        .and_then(|s| s.registration.as_ref())
        .and_then(|r| r.aggregator_name.clone())
    {
        targets.insert(previous);
    }
    targets
}

async fn unregister_from_aggregators<K: ManagedResource>(resource: &K, ctx: &Reconciler<K>) {
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    for target in aggregator_targets(resource) {
        let aggregator = match ctx.aggregators.get(&namespace, &target).await {
            Ok(Some(aggregator)) => aggregator,
            Ok(None) => {
                debug!(aggregator = %target, "Aggregator not found, nothing to unregister");
                continue;
            }
            Err(e) => {
                warn!(aggregator = %target, error = %e, "Failed to read aggregator");
                continue;
            }
        };

        // Push-declared applications belong to the aggregator's own pass
        if aggregator.spec.declares_application(K::SERVICE_TYPE, &name) {
            debug!(aggregator = %target, "Application is push-declared, leaving it in place");
            continue;
        }

        let timeout = Duration::from_secs(ctx.config.http_timeout_secs);
        let client = match client_for_aggregator(
            &aggregator,
            ctx.secrets.as_ref(),
            ctx.aggregator_clients.as_ref(),
            timeout,
        )
        .await
        {
            Ok(client) => client,
            Err(e) => {
                warn!(aggregator = %target, error = %e, "Cannot reach aggregator to unregister");
                continue;
            }
        };

        match client.unregister_application(&name).await {
            Ok(true) => info!(aggregator = %target, "Unregistered from aggregator"),
            Ok(false) => debug!(aggregator = %target, "No registration to remove"),
            Err(e) => warn!(aggregator = %target, error = %e, "Failed to unregister"),
        }
    }
}

/// Converge the backend towards an empty desired state
async fn remove_managed_items<K: ManagedResource>(
    resource: &K,
    ctx: &Reconciler<K>,
) -> Result<(), StepError> {
    let namespace = resource.namespace().unwrap_or_default();
    let secrets = resolve_all(resource, &namespace, ctx.secrets.as_ref()).await?;
    let adapter = adapter_for(ctx)?;
    let conn = connection_descriptor(resource, &secrets, &ctx.config);

    adapter.connect(&conn).await.map_err(StepError::Connect)?;
    let capabilities = adapter.discover(&conn).await.map_err(StepError::Discover)?;
    let observed = adapter
        .current_state(&conn)
        .await
        .map_err(StepError::CurrentState)?;
    let owned = resource
        .service_status()
        .map(|status| Ownership::from_records(&status.managed_items))
        .unwrap_or_default();
    let changes = adapter
        .diff(&observed, &DesiredState::empty(), &capabilities, &owned)
        .map_err(StepError::Diff)?;

    if changes.is_empty() {
        debug!("Nothing to remove from backend");
        return Ok(());
    }

    let result = adapter
        .apply(&conn, &changes)
        .await
        .map_err(StepError::Apply)?;
    info!(summary = %result.summary(), "Removed managed items from backend");
    Ok(())
}
