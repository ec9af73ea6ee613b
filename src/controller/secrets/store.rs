//! # Secret Store
//!
//! Read access to Kubernetes Secrets. The pipeline only needs "fetch one
//! secret by name", so the seam is a single async method.

use crate::controller::secrets::SecretError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;

/// Raw secret payload, key to bytes
pub type SecretData = BTreeMap<String, Vec<u8>>;

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret; `Ok(None)` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, SecretError>;
}

#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, SecretError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets
            .get_opt(name)
            .await
            .map_err(|e| SecretError::Store {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source: Box::new(e),
            })?;

        Ok(secret.map(|secret| {
            let mut data: SecretData = secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, value.0))
                .collect();
            for (key, value) in secret.string_data.unwrap_or_default() {
                data.entry(key).or_insert_with(|| value.into_bytes());
            }
            data
        }))
    }
}
