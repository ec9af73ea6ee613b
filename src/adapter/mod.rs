//! # Adapters
//!
//! An adapter converges one kind of backend service. The engine drives it
//! through a fixed sequence: connect, discover, current state, diff, apply.
//! Adapters may additionally expose direct-apply (settings that are not
//! name-keyed lists) and health checking through the optional accessors.

mod diff;
mod registry;
pub mod servarr;
mod types;

pub use diff::diff_states;
pub use registry::AdapterRegistry;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },
    #[error("unexpected response from {url}: {detail}")]
    InvalidResponse { url: String, detail: String },
    #[error("{0}")]
    Other(String),
}

impl AdapterError {
    /// The backend could not be reached at all
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Request { .. })
    }
}

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Registry key, e.g. `sonarr`
    fn service_type(&self) -> &str;

    /// Probe connectivity and return the reported service version
    async fn connect(&self, conn: &ConnectionDescriptor) -> Result<String, AdapterError>;

    async fn discover(&self, conn: &ConnectionDescriptor) -> Result<Capabilities, AdapterError>;

    async fn current_state(&self, conn: &ConnectionDescriptor)
        -> Result<ObservedState, AdapterError>;

    /// Compute changes; never touches a kind the capabilities do not support
    /// and never deletes an item outside `owned`
    fn diff(
        &self,
        observed: &ObservedState,
        desired: &DesiredState,
        capabilities: &Capabilities,
        owned: &Ownership,
    ) -> Result<ChangeSet, AdapterError> {
        Ok(diff_states(observed, desired, capabilities, owned))
    }

    /// Apply changes, recording each outcome. An `Err` means the apply could not proceed at all.
    async fn apply(
        &self,
        conn: &ConnectionDescriptor,
        changes: &ChangeSet,
    ) -> Result<ApplyResult, AdapterError>;

    fn as_direct_apply(&self) -> Option<&dyn DirectApply> {
        None
    }

    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        None
    }
}

/// Settings pushed as-is after the main convergence step
#[async_trait]
pub trait DirectApply: Send + Sync {
    async fn direct_apply(
        &self,
        conn: &ConnectionDescriptor,
        desired: &DesiredState,
        capabilities: &Capabilities,
    ) -> Result<(), AdapterError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health(&self, conn: &ConnectionDescriptor) -> Result<Vec<HealthIssue>, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_request_errors_are_transport_failures() {
        let errors = [
            AdapterError::Status {
                method: "GET".into(),
                url: "http://sonarr:8989/api/v3/indexer".into(),
                status: 401,
                body: "Unauthorized".into(),
            },
            AdapterError::InvalidResponse {
                url: "http://sonarr:8989/api/v3/system/status".into(),
                detail: "missing version".into(),
            },
            AdapterError::Other("no adapter".into()),
        ];
        assert!(errors.iter().all(|e| !e.is_transport()));
    }
}
