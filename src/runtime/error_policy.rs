//! # Error Policy
//!
//! Error handling for the controller watch loops. Errors that escape a pass
//! were already reflected in status (or are status-write failures), so the
//! policy only logs, counts and requeues at the error interval.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::controller::registration::{RegistrationCoordinator, RegistrationError};
use crate::crd::{ManagedResource, ProwlarrConfig};
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Requeue a resource whose pass returned an error
pub fn handle_reconciliation_error<K: ManagedResource>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler<K>>,
) -> Action {
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %obj.name_any(),
        resource.namespace = %obj.namespace().unwrap_or_default(),
        service.type = K::SERVICE_TYPE,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error: {:?}", error);
    observability::metrics::increment_reconciliation_errors(K::SERVICE_TYPE);
    observability::metrics::increment_requeues_total("error");
    Action::requeue(ctx.config.reconciliation_error_requeue_duration())
}

/// Requeue an aggregator whose registration pass reported failures
pub fn handle_registration_error(
    obj: Arc<ProwlarrConfig>,
    error: &RegistrationError,
    ctx: Arc<RegistrationCoordinator>,
) -> Action {
    warn!(
        aggregator.name = %obj.name_any(),
        aggregator.namespace = %obj.namespace().unwrap_or_default(),
        error = %error,
        "Registration pass reported errors"
    );
    observability::metrics::increment_reconciliation_errors("registration");
    observability::metrics::increment_requeues_total("registration-error");
    Action::requeue(ctx.config.reconciliation_error_requeue_duration())
}

/// Broad classes of watch stream failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// RBAC revoked or token expired
    Unauthorized,
    /// Resource version too old; a relist fixes it
    Expired,
    /// API server storage reinitializing or rate limiting
    Throttled,
    /// Object or CRD missing
    NotFound,
    Other,
}

/// Classify a stringified controller error.
///
/// 404 is checked before 401 because a plain-text 404 surfaces as a
/// `WatchFailed` serde error that may mention other codes.
pub fn classify_stream_error(error: &str) -> StreamErrorKind {
    let is_not_found =
        error.contains("ObjectNotFound") || error.contains("404") || error.contains("not found");
    if is_not_found {
        StreamErrorKind::NotFound
    } else if error.contains("401") || error.contains("Unauthorized") {
        StreamErrorKind::Unauthorized
    } else if error.contains("410")
        || error.contains("too old resource version")
        || error.contains("Expired")
        || error.contains("Gone")
    {
        StreamErrorKind::Expired
    } else if error.contains("429")
        || error.contains("storage is (re)initializing")
        || error.contains("TooManyRequests")
    {
        StreamErrorKind::Throttled
    } else {
        StreamErrorKind::Other
    }
}

/// Handle one error item from a controller stream.
///
/// Returns `true` when the stream should keep running; `false` ends it so
/// the restart loop re-creates the controller after `restart_delay`.
pub async fn handle_watch_stream_error(kind_name: &str, error: &str, restart_delay: Duration) -> bool {
    match classify_stream_error(error) {
        StreamErrorKind::NotFound => {
            // Reconciled objects vanish all the time; the controller carries on
            warn!(kind = kind_name, error = error, "watch.error.not_found");
            true
        }
        StreamErrorKind::Expired => {
            warn!(kind = kind_name, "watch.error.resource_version_expired");
            false
        }
        StreamErrorKind::Unauthorized => {
            error!(
                kind = kind_name,
                "Watch authentication failed (401), check the controller's RBAC bindings"
            );
            tokio::time::sleep(restart_delay).await;
            false
        }
        StreamErrorKind::Throttled => {
            warn!(kind = kind_name, "API server throttling watch (429), backing off");
            tokio::time::sleep(restart_delay).await;
            false
        }
        StreamErrorKind::Other => {
            // Per-object reconcile failures also arrive here; they are
            // already requeued by the error policy
            warn!(kind = kind_name, error = error, "Controller stream error");
            true
        }
    }
}
