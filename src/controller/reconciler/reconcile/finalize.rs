//! # Reconciliation Finalization
//!
//! Persists the status a pass accumulated and decides when the resource is
//! looked at again.

use crate::config::parse_kubernetes_duration;
use crate::constants::RECONCILE_REQUEST_ANNOTATION;
use crate::controller::reconciler::reconcile::pass::PassOutcome;
use crate::controller::reconciler::status::StatusTracker;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::store::StatusUpdate;
use crate::crd::ManagedResource;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Write status and turn the pass outcome into the next action
pub async fn finalize_pass<K: ManagedResource>(
    resource: &K,
    ctx: &Reconciler<K>,
    mut tracker: StatusTracker,
    outcome: PassOutcome,
) -> Result<Action, ReconcilerError> {
    let requeue_after = match outcome {
        PassOutcome::Converged => success_interval(resource, ctx),
        _ => ctx.config.reconciliation_error_requeue_duration(),
    };

    tracker.schedule_next(requeue_after);
    tracker.handled_request(
        resource
            .annotations()
            .get(RECONCILE_REQUEST_ANNOTATION)
            .map(String::as_str),
    );
    let next = tracker.status().next_reconcile_time.clone();

    if let Err(e) = ctx
        .store
        .update_status(resource, StatusUpdate::Service(tracker.finish()))
        .await
    {
        error!(error = %e, "Failed to persist status");
        return Err(ReconcilerError::StatusWrite(e));
    }

    match outcome {
        PassOutcome::ApplyFailed(e) => Err(ReconcilerError::Apply(e)),
        PassOutcome::Converged => {
            info!(
                next_reconcile = next.as_deref().unwrap_or("unknown"),
                "Reconciliation complete"
            );
            metrics::increment_requeues_total("success");
            Ok(Action::requeue(requeue_after))
        }
        PassOutcome::Degraded | PassOutcome::Failed => {
            debug!(
                requeue_secs = requeue_after.as_secs(),
                "Requeueing at the error interval"
            );
            metrics::increment_requeues_total("error");
            Ok(Action::requeue(requeue_after))
        }
    }
}

/// `spec.reconciliation.interval` when it parses, otherwise the default
pub(crate) fn success_interval<K: ManagedResource>(resource: &K, ctx: &Reconciler<K>) -> Duration {
    let default = ctx.config.default_reconcile_interval_duration();
    let Some(interval) = resource
        .reconciliation()
        .and_then(|r| r.interval.as_deref())
    else {
        return default;
    };

    match parse_kubernetes_duration(interval) {
        Ok(duration) => duration,
        Err(e) => {
            warn!(
                interval = interval,
                error = %e,
                default_secs = default.as_secs(),
                "Invalid reconciliation interval, using default"
            );
            metrics::increment_duration_parsing_errors();
            default
        }
    }
}
