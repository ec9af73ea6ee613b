//! # Registration
//!
//! Pull-style registration of downstream services with the aggregator, and
//! the arbitration against push-style declarations on the aggregator's own
//! `applications` list. A (service type, name) pair may be connected by one
//! model only; both at once is a conflict, never a merge.

mod api_key;
mod client;
mod coordinator;

pub use api_key::resolve_registration_api_key;
pub use client::{
    AggregatorClient, AggregatorClientFactory, ApplicationRegistration, ProwlarrClient,
    ProwlarrClientFactory, RegistrationField,
};
pub use coordinator::{aggregators_for, reconcile_registrations, RegistrationCoordinator};

use crate::constants::DEFAULT_API_KEY_SECRET_KEY;
use crate::controller::secrets::{resolve_key, SecretError, SecretStore};
use crate::controller::store::StoreError;
use crate::crd::{AggregatorRef, ManagedResource, ProwlarrConfig, ProwlarrConfigSpec};
use kube::ResourceExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("aggregator returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("aggregator client unavailable: {0}")]
    AggregatorUnavailable(String),
    #[error("no API key available for {0}")]
    MissingApiKey(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("service type '{0}' cannot be registered with an aggregator")]
    UnknownServiceType(String),
    #[error("registration failed for: {}", .0.join(", "))]
    Failed(Vec<String>),
}

/// What the coordinator should do with one downstream resource
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationDecision {
    /// Not related to this aggregator
    Skip,
    /// Used to reference this aggregator, no longer does
    Release,
    /// Also declared on the aggregator's push list
    Conflict,
    /// References this aggregator with auto-registration off
    Disabled,
    Register(AggregatorRef),
}

/// Lowercased (service type, name) pairs declared on the aggregator's push list
pub fn push_declarations(spec: &ProwlarrConfigSpec) -> BTreeSet<(String, String)> {
    spec.applications
        .iter()
        .map(|app| (app.service_type.to_lowercase(), app.name.clone()))
        .collect()
}

pub fn decide<K: ManagedResource>(
    resource: &K,
    aggregator_name: &str,
    push_set: &BTreeSet<(String, String)>,
) -> RegistrationDecision {
    let Some(reference) = resource
        .aggregator_ref()
        .filter(|r| r.name == aggregator_name)
    else {
        let previously_here = resource
            .service_status()
            .and_then(|s| s.registration.as_ref())
            .and_then(|r| r.aggregator_name.as_deref())
            == Some(aggregator_name);
        return if previously_here {
            RegistrationDecision::Release
        } else {
            RegistrationDecision::Skip
        };
    };

    if push_set.contains(&(K::SERVICE_TYPE.to_string(), resource.name_any())) {
        RegistrationDecision::Conflict
    } else if !reference.auto_register {
        RegistrationDecision::Disabled
    } else {
        RegistrationDecision::Register(reference.clone())
    }
}

/// Client for `aggregator`, authenticated with its own connection secret
pub async fn client_for_aggregator(
    aggregator: &ProwlarrConfig,
    secrets: &dyn SecretStore,
    factory: &dyn AggregatorClientFactory,
    default_timeout: Duration,
) -> Result<Arc<dyn AggregatorClient>, RegistrationError> {
    let namespace = aggregator.namespace().unwrap_or_default();
    let connection = &aggregator.spec.connection;
    let api_key = resolve_key(
        secrets,
        &namespace,
        &connection.api_key_secret_ref.name,
        connection
            .api_key_secret_ref
            .key_or(DEFAULT_API_KEY_SECRET_KEY),
    )
    .await?;
    if api_key.is_empty() {
        return Err(RegistrationError::MissingApiKey(aggregator.name_any()));
    }
    let timeout = connection
        .timeout_seconds
        .map_or(default_timeout, Duration::from_secs);
    Ok(factory.client(&connection.url, &api_key, timeout))
}
