//! # Registration Coordinator
//!
//! A second control loop keyed on the aggregator. Each pass walks every
//! downstream resource in the aggregator's namespace, decides its
//! registration and writes the outcome to that resource's
//! `status.registration`. One resource failing never stops the others.

use crate::compiler::{application_implementation, default_sync_categories};
use crate::config::ControllerConfig;
use crate::controller::events::{EventPublisher, EventSeverity, KubeEventPublisher};
use crate::controller::registration::{
    client_for_aggregator, decide, push_declarations, resolve_registration_api_key,
    AggregatorClient, AggregatorClientFactory, ApplicationRegistration, ProwlarrClientFactory,
    RegistrationDecision, RegistrationError,
};
use crate::controller::secrets::{KubeSecretStore, SecretStore};
use crate::controller::store::{KubeStore, ResourceStore, StatusUpdate};
use crate::crd::{
    AggregatorRef, LidarrConfig, ManagedResource, ProwlarrConfig, RadarrConfig, ReadarrConfig,
    RegistrationStatus, SonarrConfig,
};
use crate::observability::metrics;
use chrono::Utc;
use kube::{Client, Resource, ResourceExt};
use kube_runtime::controller::Action;
use kube_runtime::reflector::ObjectRef;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

const DEFAULT_SYNC_LEVEL: &str = "fullSync";

/// Shared context of the coordinator controller
pub struct RegistrationCoordinator {
    pub aggregators: Arc<dyn ResourceStore<ProwlarrConfig>>,
    pub sonarr: Arc<dyn ResourceStore<SonarrConfig>>,
    pub radarr: Arc<dyn ResourceStore<RadarrConfig>>,
    pub lidarr: Arc<dyn ResourceStore<LidarrConfig>>,
    pub readarr: Arc<dyn ResourceStore<ReadarrConfig>>,
    pub secrets: Arc<dyn SecretStore>,
    pub clients: Arc<dyn AggregatorClientFactory>,
    pub events: Arc<dyn EventPublisher>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for RegistrationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RegistrationCoordinator {
    pub fn new(client: Client, http: reqwest::Client, config: ControllerConfig) -> Self {
        Self {
            aggregators: Arc::new(KubeStore::<ProwlarrConfig>::new(client.clone())),
            sonarr: Arc::new(KubeStore::<SonarrConfig>::new(client.clone())),
            radarr: Arc::new(KubeStore::<RadarrConfig>::new(client.clone())),
            lidarr: Arc::new(KubeStore::<LidarrConfig>::new(client.clone())),
            readarr: Arc::new(KubeStore::<ReadarrConfig>::new(client.clone())),
            secrets: Arc::new(KubeSecretStore::new(client.clone())),
            clients: Arc::new(ProwlarrClientFactory::new(http)),
            events: Arc::new(KubeEventPublisher::new(client)),
            config,
        }
    }
}

/// Watch mapper from a downstream resource to the aggregators whose pass
/// should look at it. Empty once the registration record is current, so the
/// coordinator's own status writes do not retrigger it.
pub fn aggregators_for<K: ManagedResource>(resource: K) -> Vec<ObjectRef<ProwlarrConfig>> {
    let Some(namespace) = resource.namespace() else {
        return Vec::new();
    };
    let registration = resource
        .service_status()
        .and_then(|s| s.registration.as_ref());
    if registration.is_some_and(|r| r.observed_generation == resource.meta().generation) {
        return Vec::new();
    }

    let mut names = BTreeSet::new();
    if let Some(reference) = resource.aggregator_ref() {
        names.insert(reference.name.clone());
    }
    if let Some(previous) = registration.and_then(|r| r.aggregator_name.clone()) {
        names.insert(previous);
    }
    names
        .into_iter()
        .map(|name| ObjectRef::new(&name).within(&namespace))
        .collect()
}

/// One coordinator pass over a single aggregator
pub async fn reconcile_registrations(
    aggregator: Arc<ProwlarrConfig>,
    ctx: Arc<RegistrationCoordinator>,
) -> Result<Action, RegistrationError> {
    let name = aggregator.name_any();
    let namespace = aggregator.namespace().unwrap_or_default();
    let span = tracing::info_span!(
        "registration",
        aggregator.name = %name,
        aggregator.namespace = %namespace,
    );
    coordinate(&namespace, &name, &ctx).instrument(span).await
}

/// Per-pass state shared by every downstream kind
struct Pass<'a> {
    aggregator: &'a ProwlarrConfig,
    aggregator_name: String,
    push_set: BTreeSet<(String, String)>,
    client: Result<Arc<dyn AggregatorClient>, String>,
    ctx: &'a RegistrationCoordinator,
    failures: Vec<String>,
}

async fn coordinate(
    namespace: &str,
    name: &str,
    ctx: &RegistrationCoordinator,
) -> Result<Action, RegistrationError> {
    let Some(aggregator) = ctx.aggregators.get(namespace, name).await? else {
        debug!("Aggregator no longer exists");
        return Ok(Action::await_change());
    };
    if aggregator.is_being_deleted() {
        return Ok(Action::await_change());
    }
    if !aggregator.service_status().is_some_and(|s| s.connected) {
        debug!("Aggregator not connected yet, skipping registration");
        return Ok(Action::requeue(
            ctx.config.reconciliation_error_requeue_duration(),
        ));
    }

    let client = client_for_aggregator(
        &aggregator,
        ctx.secrets.as_ref(),
        ctx.clients.as_ref(),
        Duration::from_secs(ctx.config.http_timeout_secs),
    )
    .await
    .map_err(|e| e.to_string());
    if let Err(e) = &client {
        warn!(error = %e, "Cannot build aggregator client");
    }

    let mut pass = Pass {
        aggregator: &aggregator,
        aggregator_name: name.to_string(),
        push_set: push_declarations(&aggregator.spec),
        client,
        ctx,
        failures: Vec::new(),
    };

    pass.process_kind(ctx.sonarr.as_ref(), namespace).await;
    pass.process_kind(ctx.radarr.as_ref(), namespace).await;
    pass.process_kind(ctx.lidarr.as_ref(), namespace).await;
    pass.process_kind(ctx.readarr.as_ref(), namespace).await;

    if pass.failures.is_empty() {
        info!("Registration pass complete");
        Ok(Action::requeue(ctx.config.default_reconcile_interval_duration()))
    } else {
        Err(RegistrationError::Failed(pass.failures))
    }
}

impl Pass<'_> {
    async fn process_kind<K: ManagedResource>(
        &mut self,
        store: &dyn ResourceStore<K>,
        namespace: &str,
    ) {
        let resources = match store.list(namespace).await {
            Ok(resources) => resources,
            Err(e) => {
                warn!(service.type = K::SERVICE_TYPE, error = %e, "Failed to list resources");
                self.failures.push(format!("{}: {e}", K::SERVICE_TYPE));
                return;
            }
        };

        for resource in resources.iter().filter(|r| !r.is_being_deleted()) {
            self.process(store, resource).await;
        }
    }

    async fn process<K: ManagedResource>(&mut self, store: &dyn ResourceStore<K>, resource: &K) {
        let name = resource.name_any();
        let key = format!("{}/{}", K::SERVICE_TYPE, name);
        let decision = decide(resource, &self.aggregator_name, &self.push_set);

        let (registration, outcome) = match decision {
            RegistrationDecision::Skip => return,
            RegistrationDecision::Release => (
                self.record(
                    resource,
                    false,
                    false,
                    format!("No longer references aggregator {}", self.aggregator_name),
                ),
                "released",
            ),
            RegistrationDecision::Conflict => {
                let message = format!(
                    "Declared in the applications list of {} and via aggregatorRef; remove one of them",
                    self.aggregator_name
                );
                warn!(resource = %key, "Registration conflict");
                self.publish_conflict(resource, &message).await;
                self.failures.push(format!("{key}: conflict"));
                (self.record(resource, false, true, message), "conflict")
            }
            RegistrationDecision::Disabled => (
                self.record(resource, false, true, "Auto-registration disabled"),
                "disabled",
            ),
            RegistrationDecision::Register(reference) => {
                match self.register(resource, &reference).await {
                    Ok(()) => (
                        self.record(
                            resource,
                            true,
                            true,
                            format!("Registered with {}", self.aggregator_name),
                        ),
                        "registered",
                    ),
                    Err(e) => {
                        warn!(resource = %key, error = %e, "Registration failed");
                        self.failures.push(format!("{key}: {e}"));
                        (
                            self.record(
                                resource,
                                false,
                                true,
                                format!("Registration failed: {e}"),
                            ),
                            "failed",
                        )
                    }
                }
            }
        };

        metrics::increment_registrations(outcome);
        if let Err(e) = store
            .update_status(resource, StatusUpdate::Registration(registration))
            .await
        {
            warn!(resource = %key, error = %e, "Failed to write registration status");
            self.failures.push(format!("{key}: {e}"));
        }
    }

    /// Registration record for `resource`; `attached` keeps the record
    /// pointing at this aggregator
    fn record<K: ManagedResource>(
        &self,
        resource: &K,
        registered: bool,
        attached: bool,
        message: impl Into<String>,
    ) -> RegistrationStatus {
        RegistrationStatus {
            registered,
            aggregator_name: attached.then(|| self.aggregator_name.clone()),
            last_sync_time: Some(Utc::now().to_rfc3339()),
            message: Some(message.into()),
            observed_generation: resource.meta().generation,
        }
    }

    async fn register<K: ManagedResource>(
        &self,
        resource: &K,
        reference: &AggregatorRef,
    ) -> Result<(), RegistrationError> {
        let client = self
            .client
            .as_ref()
            .map_err(|e| RegistrationError::AggregatorUnavailable(e.clone()))?;
        let implementation = application_implementation(K::SERVICE_TYPE)
            .ok_or_else(|| RegistrationError::UnknownServiceType(K::SERVICE_TYPE.to_string()))?;
        let api_key = resolve_registration_api_key(resource, self.ctx.secrets.as_ref()).await?;

        let categories = if reference.sync_categories.is_empty() {
            default_sync_categories(K::SERVICE_TYPE)
        } else {
            reference.sync_categories.as_slice()
        };
        let app = ApplicationRegistration::for_service(
            &resource.name_any(),
            implementation,
            &self.aggregator.spec.connection.url,
            &resource.connection().url,
            &api_key,
            reference.sync_level.as_deref().unwrap_or(DEFAULT_SYNC_LEVEL),
            categories,
        );
        let registered = client.register_application(&app).await?;
        debug!(id = ?registered.id, "Application registered");
        Ok(())
    }

    async fn publish_conflict<K: ManagedResource>(&self, resource: &K, message: &str) {
        if let Err(e) = self
            .ctx
            .events
            .publish(
                &resource.object_ref(&()),
                EventSeverity::Warning,
                "RegistrationConflict",
                message,
            )
            .await
        {
            warn!(error = %e, "Failed to publish conflict event");
        }
    }
}
