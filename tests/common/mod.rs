//! Common test utilities
//!
//! In-memory stand-ins for the resource store, secret store, event sink,
//! backend adapter and aggregator client, plus builders for test resources.

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::{Resource, ResourceExt};
use media_config_controller::adapter::{
    Adapter, AdapterError, AdapterRegistry, ApplyResult, Capabilities, Change, ChangeSet,
    ConnectionDescriptor, HealthCheck, HealthIssue, ObservedItem, ObservedState,
};
use media_config_controller::compiler::DefaultCompiler;
use media_config_controller::config::ControllerConfig;
use media_config_controller::controller::events::{EventPublisher, EventSeverity};
use media_config_controller::controller::reconciler::Reconciler;
use media_config_controller::controller::registration::{
    AggregatorClient, AggregatorClientFactory, ApplicationRegistration, RegistrationCoordinator,
    RegistrationError,
};
use media_config_controller::controller::secrets::{SecretData, SecretError, SecretStore};
use media_config_controller::controller::store::{ResourceStore, StatusUpdate, StoreError};
use media_config_controller::crd::{
    ConnectionSpec, LidarrConfig, ManagedResource, ProwlarrConfig, ProwlarrConfigSpec,
    RadarrConfig, ReadarrConfig, SecretKeyRef, SonarrConfig,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "media";

// ---------------------------------------------------------------------------
// Resource builders
// ---------------------------------------------------------------------------

/// Give a freshly constructed resource the metadata the API server would set
pub fn stored<K: ManagedResource>(mut resource: K) -> K {
    let meta = resource.meta_mut();
    meta.namespace = Some(NAMESPACE.to_string());
    meta.generation = Some(1);
    meta.resource_version = Some("1".to_string());
    meta.uid = Some(format!("uid-{}", meta.name.clone().unwrap_or_default()));
    resource
}

pub fn finalized<K: ManagedResource>(mut resource: K) -> K {
    resource
        .meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(K::FINALIZER.to_string());
    resource
}

pub fn deleting<K: ManagedResource>(resource: K) -> K {
    let mut value = serde_json::to_value(&resource).unwrap();
    value["metadata"]["deletionTimestamp"] = serde_json::json!("2026-01-01T00:00:00Z");
    serde_json::from_value(value).unwrap()
}

pub fn prowlarr(name: &str) -> ProwlarrConfig {
    stored(ProwlarrConfig::new(
        name,
        ProwlarrConfigSpec {
            connection: ConnectionSpec {
                url: format!("http://{name}:9696"),
                api_key_secret_ref: SecretKeyRef {
                    name: format!("{name}-api-key"),
                    key: None,
                },
                timeout_seconds: None,
            },
            reconciliation: None,
            indexers: Vec::new(),
            indexer_proxies: Vec::new(),
            applications: Vec::new(),
            download_clients: Vec::new(),
            authentication: None,
        },
    ))
}

// ---------------------------------------------------------------------------
// Resource store
// ---------------------------------------------------------------------------

pub struct MemoryStore<K> {
    objects: Mutex<BTreeMap<(String, String), K>>,
    pub status_writes: Mutex<Vec<StatusUpdate>>,
    pub fail_status_writes: AtomicBool,
}

impl<K: ManagedResource> MemoryStore<K> {
    pub fn with(objects: Vec<K>) -> Arc<Self> {
        let store = Self {
            objects: Mutex::new(BTreeMap::new()),
            status_writes: Mutex::new(Vec::new()),
            fail_status_writes: AtomicBool::new(false),
        };
        for object in objects {
            store.put(object);
        }
        Arc::new(store)
    }

    pub fn put(&self, object: K) {
        let key = (object.namespace().unwrap_or_default(), object.name_any());
        self.objects.lock().unwrap().insert(key, object);
    }

    pub fn object(&self, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(NAMESPACE.to_string(), name.to_string()))
            .cloned()
    }

    pub fn status_write_count(&self) -> usize {
        self.status_writes.lock().unwrap().len()
    }

    fn key(obj: &K) -> (String, String) {
        (obj.namespace().unwrap_or_default(), obj.name_any())
    }
}

fn bump_version<K: ManagedResource>(obj: &mut K) {
    let next = obj
        .meta()
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or_default()
        + 1;
    obj.meta_mut().resource_version = Some(next.to_string());
}

#[async_trait]
impl<K: ManagedResource> ResourceStore<K> for MemoryStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn add_finalizer(&self, obj: &K, finalizer: &str) -> Result<K, StoreError> {
        let mut objects = self.objects.lock().unwrap();
        let key = Self::key(obj);
        let stored = objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::Conflict(format!("{}/{}", key.0, key.1)))?;
        stored
            .meta_mut()
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(finalizer.to_string());
        bump_version(stored);
        Ok(stored.clone())
    }

    async fn remove_finalizer(&self, obj: &K, finalizer: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().unwrap();
        let key = Self::key(obj);
        let Some(stored) = objects.get_mut(&key) else {
            return Ok(());
        };
        if let Some(finalizers) = stored.meta_mut().finalizers.as_mut() {
            finalizers.retain(|f| f != finalizer);
        }
        let released = stored.meta().deletion_timestamp.is_some() && stored.finalizers().is_empty();
        if released {
            objects.remove(&key);
        } else {
            bump_version(stored);
        }
        Ok(())
    }

    async fn update_status(&self, obj: &K, update: StatusUpdate) -> Result<(), StoreError> {
        let key = Self::key(obj);
        if self.fail_status_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict(format!("{}/{}", key.0, key.1)));
        }
        self.status_writes.lock().unwrap().push(update.clone());

        let mut objects = self.objects.lock().unwrap();
        let Some(stored) = objects.get_mut(&key) else {
            return Ok(());
        };
        let slot = stored.service_status_mut();
        match update {
            StatusUpdate::Service(mut status) => {
                status.registration = slot.as_ref().and_then(|s| s.registration.clone());
                *slot = Some(status);
            }
            StatusUpdate::Registration(registration) => {
                slot.get_or_insert_with(Default::default).registration = Some(registration);
            }
        }
        bump_version(stored);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Secrets and events
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<BTreeMap<(String, String), SecretData>>,
}

impl MemorySecretStore {
    pub fn insert(&self, name: &str, entries: &[(&str, &str)]) {
        let data = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect();
        self.secrets
            .lock()
            .unwrap()
            .insert((NAMESPACE.to_string(), name.to_string()), data);
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, SecretError> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub object: String,
    pub severity: EventSeverity,
    pub reason: String,
    pub note: String,
}

#[derive(Default)]
pub struct RecordingEvents {
    pub events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    pub fn reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.reason.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(
        &self,
        reference: &ObjectReference,
        severity: EventSeverity,
        reason: &str,
        note: &str,
    ) -> Result<(), kube::Error> {
        self.events.lock().unwrap().push(RecordedEvent {
            object: reference.name.clone().unwrap_or_default(),
            severity,
            reason: reason.to_string(),
            note: note.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Backend adapter
// ---------------------------------------------------------------------------

/// Adapter whose backend is an in-memory [`ObservedState`]
pub struct ScriptedAdapter {
    service_type: String,
    pub version: String,
    pub capabilities: Capabilities,
    pub observed: Mutex<ObservedState>,
    /// Connect fails with this message when set
    pub connect_failure: Mutex<Option<String>>,
    /// Apply fails outright with this message when set
    pub apply_failure: Mutex<Option<String>>,
    /// Names of items whose individual changes fail
    pub failing_items: Mutex<HashSet<String>>,
    /// Health report; `None` disables the health capability
    pub health: Mutex<Option<Vec<HealthIssue>>>,
    pub applied: Mutex<Vec<String>>,
    pub connects: AtomicUsize,
    pub last_api_key: Mutex<Option<String>>,
    next_id: AtomicI64,
}

impl ScriptedAdapter {
    pub fn new(service_type: &str) -> Arc<Self> {
        Arc::new(Self {
            service_type: service_type.to_string(),
            version: "4.0.0".to_string(),
            capabilities: Capabilities::all(),
            observed: Mutex::new(ObservedState::default()),
            connect_failure: Mutex::new(None),
            apply_failure: Mutex::new(None),
            failing_items: Mutex::new(HashSet::new()),
            health: Mutex::new(None),
            applied: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            last_api_key: Mutex::new(None),
            next_id: AtomicI64::new(1),
        })
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn execute(&self, change: &Change) {
        let mut observed = self.observed.lock().unwrap();
        match change {
            Change::Create { kind, item } => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                observed.items_mut(*kind).push(ObservedItem {
                    id,
                    item: item.clone(),
                });
            }
            Change::Update { kind, id, item } => {
                if let Some(existing) = observed.items_mut(*kind).iter_mut().find(|i| i.id == *id) {
                    existing.item = item.clone();
                }
            }
            Change::Delete { kind, id, .. } => {
                observed.items_mut(*kind).retain(|i| i.id != *id);
            }
        }
    }
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    fn service_type(&self) -> &str {
        &self.service_type
    }

    async fn connect(&self, conn: &ConnectionDescriptor) -> Result<String, AdapterError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_api_key.lock().unwrap() = Some(conn.api_key.clone());
        match self.connect_failure.lock().unwrap().clone() {
            Some(message) => Err(AdapterError::Other(message)),
            None => Ok(self.version.clone()),
        }
    }

    async fn discover(&self, _conn: &ConnectionDescriptor) -> Result<Capabilities, AdapterError> {
        Ok(self.capabilities.clone())
    }

    async fn current_state(
        &self,
        _conn: &ConnectionDescriptor,
    ) -> Result<ObservedState, AdapterError> {
        Ok(self.observed.lock().unwrap().clone())
    }

    async fn apply(
        &self,
        _conn: &ConnectionDescriptor,
        changes: &ChangeSet,
    ) -> Result<ApplyResult, AdapterError> {
        if let Some(message) = self.apply_failure.lock().unwrap().clone() {
            return Err(AdapterError::Other(message));
        }
        let failing = self.failing_items.lock().unwrap().clone();
        let mut result = ApplyResult::default();
        for change in changes {
            if failing.contains(change.name()) {
                result.record_failed(change, "HTTP 400: validation failed");
                continue;
            }
            self.execute(change);
            self.applied.lock().unwrap().push(change.to_string());
            result.record_applied();
        }
        Ok(result)
    }

    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        if self.health.lock().unwrap().is_some() {
            Some(self as &dyn HealthCheck)
        } else {
            None
        }
    }
}

#[async_trait]
impl HealthCheck for ScriptedAdapter {
    async fn health(&self, _conn: &ConnectionDescriptor) -> Result<Vec<HealthIssue>, AdapterError> {
        Ok(self.health.lock().unwrap().clone().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeAggregatorClient {
    pub apps: Mutex<Vec<ApplicationRegistration>>,
    pub fail_writes: AtomicBool,
    next_id: AtomicI64,
}

impl FakeAggregatorClient {
    pub fn app(&self, name: &str) -> Option<ApplicationRegistration> {
        self.apps
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.name == name)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.apps.lock().unwrap().len()
    }

    fn check_writes(&self) -> Result<(), RegistrationError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RegistrationError::Api {
                status: 500,
                body: "internal error".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AggregatorClient for FakeAggregatorClient {
    async fn list_applications(&self) -> Result<Vec<ApplicationRegistration>, RegistrationError> {
        Ok(self.apps.lock().unwrap().clone())
    }

    async fn create_application(
        &self,
        app: &ApplicationRegistration,
    ) -> Result<ApplicationRegistration, RegistrationError> {
        self.check_writes()?;
        let mut created = app.clone();
        created.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.apps.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_application(
        &self,
        id: i64,
        app: &ApplicationRegistration,
    ) -> Result<ApplicationRegistration, RegistrationError> {
        self.check_writes()?;
        let mut apps = self.apps.lock().unwrap();
        let existing = apps
            .iter_mut()
            .find(|a| a.id == Some(id))
            .ok_or(RegistrationError::Api {
                status: 404,
                body: "not found".into(),
            })?;
        *existing = app.clone();
        Ok(app.clone())
    }

    async fn delete_application(&self, id: i64) -> Result<(), RegistrationError> {
        self.check_writes()?;
        self.apps.lock().unwrap().retain(|a| a.id != Some(id));
        Ok(())
    }
}

/// Hands out the same fake client for every aggregator and records the URLs asked for
#[derive(Default)]
pub struct FakeAggregatorFactory {
    pub client: Arc<FakeAggregatorClient>,
    pub requested: Mutex<Vec<String>>,
}

impl AggregatorClientFactory for FakeAggregatorFactory {
    fn client(&self, base_url: &str, _api_key: &str, _timeout: Duration) -> Arc<dyn AggregatorClient> {
        self.requested.lock().unwrap().push(base_url.to_string());
        Arc::clone(&self.client) as Arc<dyn AggregatorClient>
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// One reconciler context over in-memory collaborators
pub struct Harness<K> {
    pub store: Arc<MemoryStore<K>>,
    pub aggregators: Arc<MemoryStore<ProwlarrConfig>>,
    pub secrets: Arc<MemorySecretStore>,
    pub events: Arc<RecordingEvents>,
    pub adapter: Arc<ScriptedAdapter>,
    pub aggregator: Arc<FakeAggregatorFactory>,
    pub ctx: Arc<Reconciler<K>>,
}

impl<K: ManagedResource> Harness<K> {
    pub fn new(resources: Vec<K>) -> Self {
        Self::with_aggregators(resources, Vec::new())
    }

    pub fn with_aggregators(resources: Vec<K>, aggregators: Vec<ProwlarrConfig>) -> Self {
        let store = MemoryStore::with(resources);
        let aggregators = MemoryStore::with(aggregators);
        let secrets = Arc::new(MemorySecretStore::default());
        let events = Arc::new(RecordingEvents::default());
        let adapter = ScriptedAdapter::new(K::SERVICE_TYPE);
        let aggregator = Arc::new(FakeAggregatorFactory::default());

        let registry = Arc::new(AdapterRegistry::new());
        registry.register(Arc::clone(&adapter) as Arc<dyn Adapter>);

        let ctx = Arc::new(Reconciler {
            store: Arc::clone(&store) as Arc<dyn ResourceStore<K>>,
            aggregators: Arc::clone(&aggregators) as Arc<dyn ResourceStore<ProwlarrConfig>>,
            secrets: Arc::clone(&secrets) as Arc<dyn SecretStore>,
            compiler: Arc::new(DefaultCompiler),
            events: Arc::clone(&events) as Arc<dyn EventPublisher>,
            adapters: registry,
            aggregator_clients: Arc::clone(&aggregator) as Arc<dyn AggregatorClientFactory>,
            config: ControllerConfig::default(),
        });

        Self {
            store,
            aggregators,
            secrets,
            events,
            adapter,
            aggregator,
            ctx,
        }
    }
}

/// Coordinator context over in-memory collaborators
pub struct CoordinatorHarness {
    pub aggregators: Arc<MemoryStore<ProwlarrConfig>>,
    pub sonarr: Arc<MemoryStore<SonarrConfig>>,
    pub radarr: Arc<MemoryStore<RadarrConfig>>,
    pub lidarr: Arc<MemoryStore<LidarrConfig>>,
    pub readarr: Arc<MemoryStore<ReadarrConfig>>,
    pub secrets: Arc<MemorySecretStore>,
    pub events: Arc<RecordingEvents>,
    pub factory: Arc<FakeAggregatorFactory>,
    pub ctx: Arc<RegistrationCoordinator>,
}

impl CoordinatorHarness {
    pub fn new(
        aggregators: Vec<ProwlarrConfig>,
        sonarr: Vec<SonarrConfig>,
        radarr: Vec<RadarrConfig>,
    ) -> Self {
        let aggregators = MemoryStore::with(aggregators);
        let sonarr = MemoryStore::with(sonarr);
        let radarr = MemoryStore::with(radarr);
        let lidarr = MemoryStore::with(Vec::new());
        let readarr = MemoryStore::with(Vec::new());
        let secrets = Arc::new(MemorySecretStore::default());
        let events = Arc::new(RecordingEvents::default());
        let factory = Arc::new(FakeAggregatorFactory::default());

        let ctx = Arc::new(RegistrationCoordinator {
            aggregators: Arc::clone(&aggregators) as Arc<dyn ResourceStore<ProwlarrConfig>>,
            sonarr: Arc::clone(&sonarr) as Arc<dyn ResourceStore<SonarrConfig>>,
            radarr: Arc::clone(&radarr) as Arc<dyn ResourceStore<RadarrConfig>>,
            lidarr: Arc::clone(&lidarr) as Arc<dyn ResourceStore<LidarrConfig>>,
            readarr: Arc::clone(&readarr) as Arc<dyn ResourceStore<ReadarrConfig>>,
            secrets: Arc::clone(&secrets) as Arc<dyn SecretStore>,
            clients: Arc::clone(&factory) as Arc<dyn AggregatorClientFactory>,
            events: Arc::clone(&events) as Arc<dyn EventPublisher>,
            config: ControllerConfig::default(),
        });

        Self {
            aggregators,
            sonarr,
            radarr,
            lidarr,
            readarr,
            secrets,
            events,
            factory,
            ctx,
        }
    }
}
