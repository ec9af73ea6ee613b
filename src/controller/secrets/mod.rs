//! # Secret Resolution
//!
//! Every secret reference declared on a resource is resolved before any
//! backend call is made. Resolution is all-or-nothing: the first missing
//! secret, missing key or undecodable value aborts the pass.
//!
//! Resolved values are stored under flat keys (see [`keys`]) so the compiler
//! can look them up without knowing which Secret they came from:
//!
//! | Key                                | Source                                  |
//! |------------------------------------|-----------------------------------------|
//! | `connection/apiKey`                | `spec.connection.apiKeySecretRef`       |
//! | `downloadClients/<name>/<field>`   | credentials or API key of a client      |
//! | `indexers/<name>/apiKey`           | `apiKeySecretRef` of an indexer         |
//! | `indexerProxies/<name>/<field>`    | credentials of an indexer proxy         |
//! | `applications/<name>/apiKey`       | API key of a pushed application         |
//! | `importLists/<name>/<key>`         | every key of an import list's secret    |
//! | `authentication/<field>`           | host authentication credentials         |

mod store;

pub use store::{KubeSecretStore, SecretData, SecretStore};

use crate::constants::{
    DEFAULT_API_KEY_SECRET_KEY, DEFAULT_PASSWORD_SECRET_KEY, DEFAULT_USERNAME_SECRET_KEY,
};
use crate::crd::{CredentialsSecretRef, ManagedResource, SecretKeyRef};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroize;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },
    #[error("key '{key}' not found in secret {namespace}/{name}")]
    KeyNotFound {
        namespace: String,
        name: String,
        key: String,
    },
    #[error("key '{key}' in secret {namespace}/{name} is not valid UTF-8")]
    InvalidEncoding {
        namespace: String,
        name: String,
        key: String,
    },
    #[error("failed to read secret {namespace}/{name}: {source}")]
    Store {
        namespace: String,
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Flat keys under which resolved values are stored
pub mod keys {
    pub const CONNECTION_API_KEY: &str = "connection/apiKey";

    pub fn download_client(name: &str, field: &str) -> String {
        format!("downloadClients/{name}/{field}")
    }

    pub fn indexer_api_key(name: &str) -> String {
        format!("indexers/{name}/apiKey")
    }

    pub fn indexer_proxy(name: &str, field: &str) -> String {
        format!("indexerProxies/{name}/{field}")
    }

    pub fn application_api_key(name: &str) -> String {
        format!("applications/{name}/apiKey")
    }

    pub fn import_list_prefix(name: &str) -> String {
        format!("importLists/{name}/")
    }

    pub fn authentication(field: &str) -> String {
        format!("authentication/{field}")
    }
}

/// Secret values resolved for one pass. Values are wiped on drop and never
/// printed by `Debug`.
#[derive(Default)]
pub struct ResolvedSecrets {
    values: BTreeMap<String, String>,
}

impl ResolvedSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: String) {
        if let Some(mut previous) = self.values.insert(key.into(), value) {
            previous.zeroize();
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Entries under `prefix`, with the prefix stripped from the key
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.values
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(move |(k, v)| (&k[prefix.len()..], v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Drop for ResolvedSecrets {
    fn drop(&mut self) {
        for value in self.values.values_mut() {
            value.zeroize();
        }
    }
}

/// Per-pass reader that fetches each Secret at most once
pub struct SecretResolver<'a> {
    store: &'a dyn SecretStore,
    namespace: &'a str,
    cache: HashMap<String, SecretData>,
}

impl fmt::Debug for SecretResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretResolver")
            .field("namespace", &self.namespace)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Drop for SecretResolver<'_> {
    fn drop(&mut self) {
        for data in self.cache.values_mut() {
            for value in data.values_mut() {
                value.zeroize();
            }
        }
    }
}

impl<'a> SecretResolver<'a> {
    pub fn new(store: &'a dyn SecretStore, namespace: &'a str) -> Self {
        Self {
            store,
            namespace,
            cache: HashMap::new(),
        }
    }

    async fn secret(&mut self, name: &str) -> Result<&SecretData, SecretError> {
        if !self.cache.contains_key(name) {
            let data = self
                .store
                .get(self.namespace, name)
                .await?
                .ok_or_else(|| SecretError::SecretNotFound {
                    namespace: self.namespace.to_string(),
                    name: name.to_string(),
                })?;
            self.cache.insert(name.to_string(), data);
        }
        self.cache
            .get(name)
            .ok_or_else(|| SecretError::SecretNotFound {
                namespace: self.namespace.to_string(),
                name: name.to_string(),
            })
    }

    /// Decoded value of `key` in secret `name`
    pub async fn value(&mut self, name: &str, key: &str) -> Result<String, SecretError> {
        let namespace = self.namespace;
        let data = self.secret(name).await?;
        let bytes = data.get(key).ok_or_else(|| SecretError::KeyNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        })?;
        decode(namespace, name, key, bytes)
    }

    /// Every decoded key/value in secret `name`
    pub async fn all(&mut self, name: &str) -> Result<Vec<(String, String)>, SecretError> {
        let namespace = self.namespace;
        let data = self.secret(name).await?;
        data.iter()
            .map(|(key, bytes)| Ok((key.clone(), decode(namespace, name, key, bytes)?)))
            .collect()
    }

    pub async fn key_ref(&mut self, reference: &SecretKeyRef) -> Result<String, SecretError> {
        self.value(&reference.name, reference.key_or(DEFAULT_API_KEY_SECRET_KEY))
            .await
    }

    async fn credentials(
        &mut self,
        reference: &CredentialsSecretRef,
    ) -> Result<(String, String), SecretError> {
        let username = self
            .value(
                &reference.name,
                reference
                    .username_key
                    .as_deref()
                    .unwrap_or(DEFAULT_USERNAME_SECRET_KEY),
            )
            .await?;
        let password = self
            .value(
                &reference.name,
                reference
                    .password_key
                    .as_deref()
                    .unwrap_or(DEFAULT_PASSWORD_SECRET_KEY),
            )
            .await?;
        Ok((username, password))
    }
}

fn decode(namespace: &str, name: &str, key: &str, bytes: &[u8]) -> Result<String, SecretError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| SecretError::InvalidEncoding {
        namespace: namespace.to_string(),
        name: name.to_string(),
        key: key.to_string(),
    })
}

/// Resolve a single key outside of a full pass
pub async fn resolve_key(
    store: &dyn SecretStore,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String, SecretError> {
    SecretResolver::new(store, namespace).value(name, key).await
}

/// Resolve every secret reference declared on `resource`
pub async fn resolve_all<K: ManagedResource>(
    resource: &K,
    namespace: &str,
    store: &dyn SecretStore,
) -> Result<ResolvedSecrets, SecretError> {
    let mut resolver = SecretResolver::new(store, namespace);
    let mut resolved = ResolvedSecrets::new();

    resolved.insert(
        keys::CONNECTION_API_KEY,
        resolver.key_ref(&resource.connection().api_key_secret_ref).await?,
    );

    for client in resource.download_clients() {
        if let Some(credentials) = &client.credentials_secret_ref {
            let (username, password) = resolver.credentials(credentials).await?;
            resolved.insert(keys::download_client(&client.name, "username"), username);
            resolved.insert(keys::download_client(&client.name, "password"), password);
        }
        if let Some(api_key) = &client.api_key_secret_ref {
            resolved.insert(
                keys::download_client(&client.name, "apiKey"),
                resolver.key_ref(api_key).await?,
            );
        }
    }

    for indexer in resource.indexers() {
        if let Some(api_key) = &indexer.api_key_secret_ref {
            resolved.insert(
                keys::indexer_api_key(&indexer.name),
                resolver.key_ref(api_key).await?,
            );
        }
    }

    for proxy in resource.indexer_proxies() {
        if let Some(credentials) = &proxy.credentials_secret_ref {
            let (username, password) = resolver.credentials(credentials).await?;
            resolved.insert(keys::indexer_proxy(&proxy.name, "username"), username);
            resolved.insert(keys::indexer_proxy(&proxy.name, "password"), password);
        }
    }

    for application in resource.applications() {
        resolved.insert(
            keys::application_api_key(&application.name),
            resolver.key_ref(&application.api_key_secret_ref).await?,
        );
    }

    for list in resource.import_lists() {
        if let Some(secret_name) = &list.settings_secret_ref {
            let prefix = keys::import_list_prefix(&list.name);
            for (key, value) in resolver.all(secret_name).await? {
                resolved.insert(format!("{prefix}{key}"), value);
            }
        }
    }

    if let Some(credentials) = resource
        .authentication()
        .and_then(|auth| auth.credentials_secret_ref.as_ref())
    {
        let (username, password) = resolver.credentials(credentials).await?;
        resolved.insert(keys::authentication("username"), username);
        resolved.insert(keys::authentication("password"), password);
    }

    debug!(
        resource.namespace = namespace,
        resolved = resolved.len(),
        "secrets.resolved"
    );
    Ok(resolved)
}
