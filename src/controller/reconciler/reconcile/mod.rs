//! # Reconciliation Logic
//!
//! Entry point for one pass over a single resource. The object handed in by
//! the watch may be stale, so the pass re-reads it, then dispatches on its
//! lifecycle state.

mod cleanup;
mod finalize;
mod pass;
mod steps;

pub use cleanup::finalize_deletion;
pub use finalize::finalize_pass;

use crate::controller::reconciler::lifecycle::LifecycleState;
use crate::controller::reconciler::status::{reasons, StatusTracker};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::ManagedResource;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use pass::{run_pass, PassOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

/// Main reconciliation function
/// Errors returned here are handled by the watch loop's error policy
pub async fn reconcile<K: ManagedResource>(
    obj: Arc<K>,
    ctx: Arc<Reconciler<K>>,
) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let namespace = obj
        .namespace()
        .ok_or(ReconcilerError::MissingMetadata("namespace"))?;
    let span = tracing::info_span!(
        "reconcile",
        resource.name = %name,
        resource.namespace = %namespace,
        service.type = K::SERVICE_TYPE,
    );
    reconcile_inner(&namespace, &name, &ctx).instrument(span).await
}

async fn reconcile_inner<K: ManagedResource>(
    namespace: &str,
    name: &str,
    ctx: &Reconciler<K>,
) -> Result<Action, ReconcilerError> {
    let Some(resource) = ctx
        .store
        .get(namespace, name)
        .await
        .map_err(ReconcilerError::Fetch)?
    else {
        debug!("Resource no longer exists, nothing to do");
        return Ok(Action::await_change());
    };

    // Deletion outranks suspension so a suspended resource can still be released.
    if resource.is_suspended() && !resource.is_being_deleted() {
        info!("Reconciliation suspended, skipping");
        return Ok(Action::await_change());
    }

    let start = Instant::now();
    metrics::increment_reconciliations(K::SERVICE_TYPE);

    let result = match LifecycleState::of(&resource) {
        LifecycleState::Deleting if !resource.has_finalizer() => {
            debug!("Deleting without our finalizer, nothing to clean up");
            Ok(Action::await_change())
        }
        LifecycleState::Deleting => finalize_deletion(&resource, ctx).await,
        LifecycleState::Unfinalized => {
            ctx.store
                .add_finalizer(&resource, K::FINALIZER)
                .await
                .map_err(ReconcilerError::Finalizer)?;
            info!(finalizer = K::FINALIZER, "Finalizer added");
            Ok(Action::requeue(Duration::ZERO))
        }
        LifecycleState::Active => {
            let mut tracker = StatusTracker::new(&resource);
            let outcome = match tokio::time::timeout(
                ctx.config.reconcile_timeout_duration(),
                run_pass(&resource, ctx, &mut tracker),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        timeout_secs = ctx.config.reconcile_timeout_secs,
                        "Reconciliation pass timed out"
                    );
                    tracker.ready(false, reasons::TIMEOUT, "Reconciliation pass timed out");
                    PassOutcome::Failed
                }
            };
            finalize_pass(&resource, ctx, tracker, outcome).await
        }
    };

    metrics::observe_reconciliation_duration(K::SERVICE_TYPE, start.elapsed().as_secs_f64());
    result
}
