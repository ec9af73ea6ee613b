//! # Resource Store
//!
//! Access to the declarative resource store. Every write carries the
//! `resourceVersion` the caller read, so a concurrent writer turns into a
//! [`StoreError::Conflict`] and the pass is retried instead of overwriting
//! newer state.

use crate::constants::FIELD_MANAGER;
use crate::crd::{ManagedResource, RegistrationStatus, ServiceStatus};
use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde_json::{json, Value};
use std::marker::PhantomData;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("kubernetes API error: {0}")]
    Kube(#[source] kube::Error),
    #[error("write conflict on {0}, object changed since it was read")]
    Conflict(String),
    #[error("object is missing metadata.{0}")]
    MissingMetadata(&'static str),
    #[error("failed to serialize patch: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    fn from_kube(err: kube::Error, key: &str) -> Self {
        match err {
            kube::Error::Api(status) if status.code == 409 => Self::Conflict(key.to_string()),
            other => Self::Kube(other),
        }
    }
}

/// A status write. The engine owns everything but `registration`; the
/// registration coordinator owns `registration` only.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    Service(ServiceStatus),
    Registration(RegistrationStatus),
}

#[async_trait]
pub trait ResourceStore<K>: Send + Sync {
    /// Fresh read; `Ok(None)` when the object no longer exists
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    async fn list(&self, namespace: &str) -> Result<Vec<K>, StoreError>;

    /// Append a finalizer and return the updated object
    async fn add_finalizer(&self, obj: &K, finalizer: &str) -> Result<K, StoreError>;

    /// Drop a finalizer. Succeeds when the object is already gone.
    async fn remove_finalizer(&self, obj: &K, finalizer: &str) -> Result<(), StoreError>;

    async fn update_status(&self, obj: &K, update: StatusUpdate) -> Result<(), StoreError>;
}

/// [`ResourceStore`] backed by the Kubernetes API
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K> std::fmt::Debug for KubeStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl<K: ManagedResource> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn locate(obj: &K) -> Result<(String, String, String), StoreError> {
        let namespace = obj
            .meta()
            .namespace
            .clone()
            .ok_or(StoreError::MissingMetadata("namespace"))?;
        let name = obj
            .meta()
            .name
            .clone()
            .ok_or(StoreError::MissingMetadata("name"))?;
        let resource_version = obj
            .meta()
            .resource_version
            .clone()
            .ok_or(StoreError::MissingMetadata("resourceVersion"))?;
        Ok((namespace, name, resource_version))
    }

    async fn patch_finalizers(
        &self,
        obj: &K,
        finalizers: Vec<String>,
    ) -> Result<Option<K>, StoreError> {
        let (namespace, name, resource_version) = Self::locate(obj)?;
        let patch = json!({
            "metadata": {
                "resourceVersion": resource_version,
                "finalizers": finalizers,
            }
        });
        match self
            .api(&namespace)
            .patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
        {
            Ok(updated) => Ok(Some(updated)),
            Err(kube::Error::Api(status)) if status.code == 404 => Ok(None),
            Err(e) => Err(StoreError::from_kube(e, &format!("{namespace}/{name}"))),
        }
    }
}

#[async_trait]
impl<K: ManagedResource> ResourceStore<K> for KubeStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("{namespace}/{name}")))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        let list = self
            .api(namespace)
            .list(&ListParams::default())
            .await
            .map_err(StoreError::Kube)?;
        Ok(list.items)
    }

    async fn add_finalizer(&self, obj: &K, finalizer: &str) -> Result<K, StoreError> {
        let mut finalizers = obj.finalizers().to_vec();
        if !finalizers.iter().any(|f| f == finalizer) {
            finalizers.push(finalizer.to_string());
        }
        self.patch_finalizers(obj, finalizers).await?.ok_or_else(|| {
            StoreError::Conflict(format!(
                "{}/{}",
                obj.namespace().unwrap_or_default(),
                obj.name_any()
            ))
        })
    }

    async fn remove_finalizer(&self, obj: &K, finalizer: &str) -> Result<(), StoreError> {
        let finalizers: Vec<String> = obj
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != finalizer)
            .cloned()
            .collect();
        if self.patch_finalizers(obj, finalizers).await?.is_none() {
            debug!(resource.name = %obj.name_any(), "Object already gone while removing finalizer");
        }
        Ok(())
    }

    async fn update_status(&self, obj: &K, update: StatusUpdate) -> Result<(), StoreError> {
        let (namespace, name, resource_version) = Self::locate(obj)?;
        let status = status_patch(obj.service_status(), update)?;
        let patch = json!({
            "metadata": { "resourceVersion": resource_version },
            "status": status,
        });
        self.api(&namespace)
            .patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("{namespace}/{name}")))?;
        Ok(())
    }
}

/// Merge-patch body for `status`.
///
/// A merge patch keeps any stored key it does not mention, so every key the
/// stored status has and the update lacks is sent as an explicit `null`. The
/// other writer's part of the status is left out of the comparison.
fn status_patch(current: Option<&ServiceStatus>, update: StatusUpdate) -> Result<Value, StoreError> {
    let mut stored = serde_json::to_value(current.cloned().unwrap_or_default())?;
    let (stored, next) = match update {
        StatusUpdate::Service(mut status) => {
            status.registration = None;
            if let Some(fields) = stored.as_object_mut() {
                fields.remove("registration");
            }
            (stored, serde_json::to_value(&status)?)
        }
        StatusUpdate::Registration(registration) => {
            let previous = stored.get("registration").cloned().unwrap_or(Value::Null);
            (
                json!({ "registration": previous }),
                json!({ "registration": registration }),
            )
        }
    };
    Ok(null_removed_keys(&stored, next))
}

fn null_removed_keys(stored: &Value, next: Value) -> Value {
    match (stored, next) {
        (Value::Object(stored), Value::Object(mut next)) => {
            for (key, previous) in stored {
                let merged = match next.remove(key) {
                    Some(value) => null_removed_keys(previous, value),
                    None => Value::Null,
                };
                next.insert(key.clone(), merged);
            }
            Value::Object(next)
        }
        (_, next) => next,
    }
}
