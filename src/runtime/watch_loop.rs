//! # Watch Loop
//!
//! One kube-runtime `Controller` per managed kind plus the registration
//! coordinator, all running concurrently. Each controller restarts after its
//! stream ends until shutdown is requested.

use crate::config::ControllerConfig;
use crate::constants::{RECONCILE_REQUEST_ANNOTATION, SCHEDULE_TOLERANCE_SECS};
use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError, TriggerSource};
use crate::controller::registration::{
    aggregators_for, reconcile_registrations, RegistrationCoordinator,
};
use crate::controller::server::ServerState;
use crate::crd::{
    LidarrConfig, ManagedResource, ProwlarrConfig, RadarrConfig, ReadarrConfig, SonarrConfig,
};
use crate::runtime::error_policy::{
    handle_reconciliation_error, handle_registration_error, handle_watch_stream_error,
};
use crate::runtime::initialization::ControllerContexts;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use kube::api::Api;
use kube::{Client, Resource, ResourceExt};
use kube_runtime::{controller, controller::Action, watcher, Controller};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the watch gate decided for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchDecision {
    Reconcile(TriggerSource),
    /// Nothing changed; look again when the scheduled pass is due
    Wait(Duration),
}

/// Filter watch events down to the ones that need a pass.
///
/// Status writes bump `resourceVersion` but not `generation`, so without this
/// gate every pass would trigger the next one.
pub fn should_reconcile<K: ManagedResource>(obj: &K, now: DateTime<Utc>) -> WatchDecision {
    if obj.is_being_deleted() {
        return WatchDecision::Reconcile(TriggerSource::Deletion);
    }
    if !obj.has_finalizer() {
        return WatchDecision::Reconcile(TriggerSource::FirstPass);
    }

    let status = obj.service_status();
    let observed_generation = status.and_then(|s| s.observed_generation);
    if observed_generation.is_none() || observed_generation != obj.meta().generation {
        return WatchDecision::Reconcile(TriggerSource::SpecChange);
    }

    if let Some(requested) = obj.annotations().get(RECONCILE_REQUEST_ANNOTATION) {
        if status.and_then(|s| s.last_handled_reconcile_at.as_deref()) != Some(requested.as_str()) {
            return WatchDecision::Reconcile(TriggerSource::ManualCli);
        }
    }

    let next = status
        .and_then(|s| s.next_reconcile_time.as_deref())
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));
    match next {
        Some(next) if now < next - chrono::Duration::seconds(SCHEDULE_TOLERANCE_SECS) => {
            WatchDecision::Wait((next - now).to_std().unwrap_or(Duration::ZERO))
        }
        _ => WatchDecision::Reconcile(TriggerSource::TimerBased),
    }
}

async fn gated_reconcile<K: ManagedResource>(
    obj: Arc<K>,
    ctx: Arc<Reconciler<K>>,
) -> Result<Action, ReconcilerError> {
    match should_reconcile(obj.as_ref(), Utc::now()) {
        WatchDecision::Wait(remaining) => {
            debug!(
                resource.name = %obj.name_any(),
                service.type = K::SERVICE_TYPE,
                wait_secs = remaining.as_secs(),
                "Skipping reconciliation - spec unchanged and next pass not yet due"
            );
            Ok(Action::requeue(remaining))
        }
        WatchDecision::Reconcile(trigger) => {
            debug!(
                resource.name = %obj.name_any(),
                service.type = K::SERVICE_TYPE,
                trigger_source = trigger.as_str(),
                "watch.event.received"
            );
            reconcile(obj, ctx).await
        }
    }
}

fn api_for<K: ManagedResource>(client: &Client, config: &ControllerConfig) -> Api<K> {
    match &config.watch_namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

fn controller_config(config: &ControllerConfig) -> controller::Config {
    controller::Config::default().concurrency(config.max_concurrent_reconciliations)
}

fn shutting_down(server_state: &ServerState) -> bool {
    !server_state.is_ready.load(Ordering::Relaxed)
}

/// Run every controller until shutdown
pub async fn run_watch_loop(
    client: Client,
    contexts: ControllerContexts,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) -> Result<(), anyhow::Error> {
    info!("Starting controller watch loops...");

    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_state.is_ready.store(false, Ordering::Relaxed);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    tokio::join!(
        run_service_controller::<SonarrConfig>(&client, contexts.sonarr, &server_state, &config),
        run_service_controller::<RadarrConfig>(&client, contexts.radarr, &server_state, &config),
        run_service_controller::<LidarrConfig>(&client, contexts.lidarr, &server_state, &config),
        run_service_controller::<ReadarrConfig>(&client, contexts.readarr, &server_state, &config),
        run_service_controller::<ProwlarrConfig>(
            &client,
            contexts.prowlarr,
            &server_state,
            &config
        ),
        run_registration_controller(&client, contexts.coordinator, &server_state, &config),
    );

    info!("Controller stopped gracefully");
    Ok(())
}

async fn run_service_controller<K: ManagedResource>(
    client: &Client,
    ctx: Arc<Reconciler<K>>,
    server_state: &ServerState,
    config: &ControllerConfig,
) {
    let restart_delay = config.watch_restart_delay_duration();
    loop {
        if shutting_down(server_state) {
            break;
        }

        info!(service.type = K::SERVICE_TYPE, "Starting controller");
        server_state.mark_running(K::SERVICE_TYPE);
        Controller::new(
            api_for::<K>(client, config),
            watcher::Config::default().any_semantic(),
        )
        .with_config(controller_config(config))
        .shutdown_on_signal()
        .run(
            gated_reconcile::<K>,
            handle_reconciliation_error::<K>,
            Arc::clone(&ctx),
        )
        .take_while(move |result| {
            let error = result.as_ref().err().map(|e| format!("{e:?}"));
            async move {
                match error {
                    None => true,
                    Some(error) => {
                        handle_watch_stream_error(K::SERVICE_TYPE, &error, restart_delay).await
                    }
                }
            }
        })
        .for_each(|_| futures::future::ready(()))
        .await;
        server_state.mark_stopped(K::SERVICE_TYPE);

        if shutting_down(server_state) {
            break;
        }
        warn!(
            service.type = K::SERVICE_TYPE,
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }
}

async fn run_registration_controller(
    client: &Client,
    ctx: Arc<RegistrationCoordinator>,
    server_state: &ServerState,
    config: &ControllerConfig,
) {
    let restart_delay = config.watch_restart_delay_duration();
    loop {
        if shutting_down(server_state) {
            break;
        }

        info!("Starting registration coordinator");
        server_state.mark_running("registration");
        Controller::new(
            api_for::<ProwlarrConfig>(client, config),
            watcher::Config::default().any_semantic(),
        )
        .with_config(controller_config(config))
        .watches(
            api_for::<SonarrConfig>(client, config),
            watcher::Config::default(),
            aggregators_for::<SonarrConfig>,
        )
        .watches(
            api_for::<RadarrConfig>(client, config),
            watcher::Config::default(),
            aggregators_for::<RadarrConfig>,
        )
        .watches(
            api_for::<LidarrConfig>(client, config),
            watcher::Config::default(),
            aggregators_for::<LidarrConfig>,
        )
        .watches(
            api_for::<ReadarrConfig>(client, config),
            watcher::Config::default(),
            aggregators_for::<ReadarrConfig>,
        )
        .shutdown_on_signal()
        .run(
            reconcile_registrations,
            handle_registration_error,
            Arc::clone(&ctx),
        )
        .take_while(move |result| {
            let error = result.as_ref().err().map(|e| format!("{e:?}"));
            async move {
                match error {
                    None => true,
                    Some(error) => {
                        handle_watch_stream_error("registration", &error, restart_delay).await
                    }
                }
            }
        })
        .for_each(|_| futures::future::ready(()))
        .await;
        server_state.mark_stopped("registration");

        if shutting_down(server_state) {
            break;
        }
        warn!(
            "Registration watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
