//! Building blocks shared by the normal pass and deletion cleanup.

use crate::adapter::{Adapter, AdapterError, ConnectionDescriptor};
use crate::compiler::CompileError;
use crate::config::ControllerConfig;
use crate::controller::reconciler::status::reasons;
use crate::controller::reconciler::types::Reconciler;
use crate::controller::secrets::{keys, ResolvedSecrets, SecretError};
use crate::crd::ManagedResource;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A failed step of the convergence sequence
#[derive(Debug, Error)]
pub(crate) enum StepError {
    #[error("secret resolution failed: {0}")]
    Secrets(#[from] SecretError),
    #[error("no adapter registered for service type '{0}'")]
    AdapterNotFound(String),
    #[error("connection failed: {0}")]
    Connect(#[source] AdapterError),
    #[error("capability discovery failed: {0}")]
    Discover(#[source] AdapterError),
    #[error("compilation failed: {0}")]
    Compile(#[from] CompileError),
    #[error("failed to fetch current state: {0}")]
    CurrentState(#[source] AdapterError),
    #[error("diff failed: {0}")]
    Diff(#[source] AdapterError),
    #[error("apply failed: {0}")]
    Apply(#[source] AdapterError),
}

impl StepError {
    pub(crate) fn reason(&self) -> &'static str {
        match self {
            Self::Secrets(_) => reasons::SECRET_RESOLUTION_FAILED,
            Self::AdapterNotFound(_) => reasons::ADAPTER_NOT_FOUND,
            Self::Connect(_) => reasons::CONNECTION_FAILED,
            Self::Discover(_) => reasons::CAPABILITY_DISCOVERY_FAILED,
            Self::Compile(_) => reasons::COMPILATION_FAILED,
            Self::CurrentState(_) => reasons::STATE_FETCH_FAILED,
            Self::Diff(_) => reasons::DIFF_FAILED,
            Self::Apply(_) => reasons::APPLY_FAILED,
        }
    }
}

pub(crate) fn adapter_for<K: ManagedResource>(
    ctx: &Reconciler<K>,
) -> Result<Arc<dyn Adapter>, StepError> {
    ctx.adapters
        .get(K::SERVICE_TYPE)
        .ok_or_else(|| StepError::AdapterNotFound(K::SERVICE_TYPE.to_string()))
}

/// Connection for this pass; the per-resource timeout wins over the global one
pub(crate) fn connection_descriptor<K: ManagedResource>(
    resource: &K,
    secrets: &ResolvedSecrets,
    config: &ControllerConfig,
) -> ConnectionDescriptor {
    let connection = resource.connection();
    let timeout = connection
        .timeout_seconds
        .map_or(Duration::from_secs(config.http_timeout_secs), Duration::from_secs);
    ConnectionDescriptor::new(
        connection.url.as_str(),
        secrets.get(keys::CONNECTION_API_KEY).unwrap_or_default(),
        timeout,
    )
}
