//! # Normal Pass
//!
//! Secrets, then Connect, Discover, compile, CurrentState, Diff and Apply, in
//! that order. Each step's success is the precondition for the next. Every
//! outcome is written into the status tracker before the pass returns.

use crate::adapter::{
    Adapter, AdapterError, Capabilities, ConnectionDescriptor, DesiredState, HealthCheck,
    HealthSeverity,
};
use crate::compiler::CompileInput;
use crate::controller::events::EventSeverity;
use crate::controller::reconciler::reconcile::steps::{
    adapter_for, connection_descriptor, StepError,
};
use crate::controller::reconciler::status::{reasons, StatusTracker};
use crate::controller::reconciler::types::Reconciler;
use crate::controller::secrets::resolve_all;
use crate::crd::ManagedResource;
use crate::observability::metrics;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};

/// How the pass ended, as far as scheduling is concerned
#[derive(Debug)]
pub(crate) enum PassOutcome {
    /// Everything applied; success interval
    Converged,
    /// Some changes failed; retried on the error interval
    Degraded,
    /// A step failed before or during convergence; error interval
    Failed,
    /// Apply could not proceed at all; the error escapes the pass
    ApplyFailed(AdapterError),
}

pub(crate) async fn run_pass<K: ManagedResource>(
    resource: &K,
    ctx: &Reconciler<K>,
    tracker: &mut StatusTracker,
) -> PassOutcome {
    match converge(resource, ctx, tracker).await {
        Ok(outcome) => outcome,
        Err(step) => {
            let message = step.to_string();
            warn!(reason = step.reason(), error = %message, "Reconciliation pass failed");
            tracker.ready(false, step.reason(), message.as_str());
            match step {
                StepError::Connect(_) => {
                    tracker.disconnected(message);
                    PassOutcome::Failed
                }
                StepError::Apply(error) => {
                    tracker.synced(false, reasons::APPLY_FAILED, message);
                    PassOutcome::ApplyFailed(error)
                }
                _ => PassOutcome::Failed,
            }
        }
    }
}

async fn converge<K: ManagedResource>(
    resource: &K,
    ctx: &Reconciler<K>,
    tracker: &mut StatusTracker,
) -> Result<PassOutcome, StepError> {
    let namespace = resource.namespace().unwrap_or_default();
    let secrets = resolve_all(resource, &namespace, ctx.secrets.as_ref()).await?;
    debug!(secrets = secrets.len(), "Resolved secret references");

    let adapter = adapter_for(ctx)?;
    let conn = connection_descriptor(resource, &secrets, &ctx.config);

    let version = adapter.connect(&conn).await.map_err(StepError::Connect)?;
    tracker.connected(version);

    let capabilities = adapter.discover(&conn).await.map_err(StepError::Discover)?;
    let desired = ctx
        .compiler
        .compile(&CompileInput::from_resource(resource, &secrets, &capabilities))?;
    let observed = adapter
        .current_state(&conn)
        .await
        .map_err(StepError::CurrentState)?;
    let owned = tracker.ownership();
    let changes = adapter
        .diff(&observed, &desired, &capabilities, &owned)
        .map_err(StepError::Diff)?;
    tracker.managed(&owned.after_apply(&observed, &desired, &capabilities, &changes, None));

    let degraded = if changes.is_empty() {
        tracker.synced(true, reasons::ALREADY_IN_SYNC, "No changes required");
        false
    } else {
        info!(changes = changes.len(), "Applying changes");
        let result = adapter
            .apply(&conn, &changes)
            .await
            .map_err(StepError::Apply)?;
        metrics::record_changes(K::SERVICE_TYPE, result.applied, result.failed);
        tracker.managed(&owned.after_apply(
            &observed,
            &desired,
            &capabilities,
            &changes,
            Some(&result),
        ));
        if result.has_failures() {
            let summary = result.summary();
            warn!(summary = %summary, "Changes partially applied");
            tracker.synced(false, reasons::PARTIALLY_APPLIED, summary.as_str());
            tracker.ready(false, reasons::PARTIALLY_APPLIED, summary);
            true
        } else {
            tracker.synced(
                true,
                reasons::CHANGES_APPLIED,
                format!("Applied {} change(s)", result.applied),
            );
            false
        }
    };

    direct_apply(adapter.as_ref(), &conn, &desired, &capabilities).await;

    if degraded {
        return Ok(PassOutcome::Degraded);
    }

    tracker.ready(
        true,
        reasons::RECONCILIATION_SUCCEEDED,
        "Service configuration converged",
    );
    tracker.converged(&desired.content_hash);

    if let Some(health) = adapter.as_health_check() {
        check_health(resource, ctx, health, &conn, tracker).await;
    }

    Ok(PassOutcome::Converged)
}

/// Supplementary settings; failures are logged and never fail the pass
async fn direct_apply(
    adapter: &dyn Adapter,
    conn: &ConnectionDescriptor,
    desired: &DesiredState,
    capabilities: &Capabilities,
) {
    if let Some(direct) = adapter.as_direct_apply() {
        match direct.direct_apply(conn, desired, capabilities).await {
            Ok(()) => debug!("Direct-apply settings converged"),
            Err(e) => warn!(error = %e, "Direct-apply failed, continuing"),
        }
    }
}

async fn check_health<K: ManagedResource>(
    resource: &K,
    ctx: &Reconciler<K>,
    health: &dyn HealthCheck,
    conn: &ConnectionDescriptor,
    tracker: &mut StatusTracker,
) {
    let issues = match health.health(conn).await {
        Ok(issues) => issues,
        Err(e) => {
            warn!(error = %e, "Health check failed");
            return;
        }
    };

    let reference = resource.object_ref(&());
    for issue in &issues {
        let reason = match issue.severity {
            HealthSeverity::Error => "HealthError",
            HealthSeverity::Warning => "HealthWarning",
            HealthSeverity::Notice => {
                debug!(source = %issue.source, message = %issue.message, "Health notice");
                continue;
            }
            HealthSeverity::Ok => continue,
        };
        let note = format!("{}: {}", issue.source, issue.message);
        if let Err(e) = ctx
            .events
            .publish(&reference, EventSeverity::Warning, reason, &note)
            .await
        {
            warn!(error = %e, "Failed to publish health event");
        }
    }
    tracker.health(&issues);
}
