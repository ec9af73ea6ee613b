//! # Types
//!
//! Core types for the reconciler.

use crate::adapter::{AdapterError, AdapterRegistry};
use crate::compiler::{Compiler, DefaultCompiler};
use crate::config::ControllerConfig;
use crate::controller::events::{EventPublisher, KubeEventPublisher};
use crate::controller::registration::{AggregatorClientFactory, ProwlarrClientFactory};
use crate::controller::secrets::{KubeSecretStore, SecretStore};
use crate::controller::store::{KubeStore, ResourceStore, StoreError};
use crate::crd::{ManagedResource, ProwlarrConfig};
use kube::Client;
use std::sync::Arc;
use thiserror::Error;

/// Errors that escape a pass. Everything else is reflected in status and
/// turned into a requeue by the pass itself.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to read resource: {0}")]
    Fetch(#[source] StoreError),
    #[error("failed to update finalizer: {0}")]
    Finalizer(#[source] StoreError),
    #[error("failed to persist status: {0}")]
    StatusWrite(#[source] StoreError),
    #[error("apply failed: {0}")]
    Apply(#[source] AdapterError),
    #[error("object is missing metadata.{0}")]
    MissingMetadata(&'static str),
}

/// Trigger source for reconciliation
/// Tracks why a reconciliation was triggered for better debugging and observability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// `mcctl reconcile` set a new request annotation
    ManualCli,
    /// The scheduled re-check is due
    TimerBased,
    /// Spec generation moved past the last observed one
    SpecChange,
    /// Finalizer not yet present
    FirstPass,
    /// Deletion timestamp set
    Deletion,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::ManualCli => "manual-cli",
            TriggerSource::TimerBased => "timer-based",
            TriggerSource::SpecChange => "spec-change",
            TriggerSource::FirstPass => "first-pass",
            TriggerSource::Deletion => "deletion",
        }
    }
}

/// Everything a pass over kind `K` needs. One instance per kind, shared by
/// all concurrent passes of that kind.
pub struct Reconciler<K> {
    pub store: Arc<dyn ResourceStore<K>>,
    /// Aggregator resources, read during deletion to unregister
    pub aggregators: Arc<dyn ResourceStore<ProwlarrConfig>>,
    pub secrets: Arc<dyn SecretStore>,
    pub compiler: Arc<dyn Compiler>,
    pub events: Arc<dyn EventPublisher>,
    pub adapters: Arc<AdapterRegistry>,
    pub aggregator_clients: Arc<dyn AggregatorClientFactory>,
    pub config: ControllerConfig,
}

impl<K> std::fmt::Debug for Reconciler<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("adapters", &self.adapters.service_types())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<K: ManagedResource> Reconciler<K> {
    /// Kubernetes-backed context using the bundled compiler
    pub fn new(
        client: Client,
        http: reqwest::Client,
        adapters: Arc<AdapterRegistry>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store: Arc::new(KubeStore::<K>::new(client.clone())),
            aggregators: Arc::new(KubeStore::<ProwlarrConfig>::new(client.clone())),
            secrets: Arc::new(KubeSecretStore::new(client.clone())),
            compiler: Arc::new(DefaultCompiler),
            events: Arc::new(KubeEventPublisher::new(client)),
            adapters,
            aggregator_clients: Arc::new(ProwlarrClientFactory::new(http)),
            config,
        }
    }
}
