//! # Servarr Adapter
//!
//! Bundled adapter for the servarr family. Sonarr and Radarr speak `/api/v3`;
//! Lidarr, Readarr and Prowlarr speak `/api/v1`. The endpoints for the
//! name-keyed lists are shared across the family.
//!
//! Quality profiles are compiled but reported as unsupported: their wire
//! format is a nested quality tree that differs per service and is not
//! converged by this adapter.

mod client;
mod resource;

use crate::adapter::{
    Adapter, AdapterError, ApplyResult, AuthenticationSettings, Capabilities, Change, ChangeSet,
    AdapterRegistry, ConfigItem, ConnectionDescriptor, DesiredState, DirectApply, HealthCheck,
    HealthIssue, HealthSeverity, ObservedState, ResourceKind,
};
use async_trait::async_trait;
use client::ServarrClient;
use resource::ProviderResource;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which servarr application an adapter instance talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServarrFlavor {
    Sonarr,
    Radarr,
    Lidarr,
    Readarr,
    Prowlarr,
}

impl ServarrFlavor {
    pub const ALL: [ServarrFlavor; 5] = [
        ServarrFlavor::Sonarr,
        ServarrFlavor::Radarr,
        ServarrFlavor::Lidarr,
        ServarrFlavor::Readarr,
        ServarrFlavor::Prowlarr,
    ];

    pub fn service_type(self) -> &'static str {
        match self {
            Self::Sonarr => "sonarr",
            Self::Radarr => "radarr",
            Self::Lidarr => "lidarr",
            Self::Readarr => "readarr",
            Self::Prowlarr => "prowlarr",
        }
    }

    pub fn api_prefix(self) -> &'static str {
        match self {
            Self::Sonarr | Self::Radarr => "api/v3",
            Self::Lidarr | Self::Readarr | Self::Prowlarr => "api/v1",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            Self::Prowlarr => Capabilities {
                indexers: true,
                indexer_proxies: true,
                download_clients: true,
                applications: true,
                authentication: true,
                ..Capabilities::default()
            },
            Self::Sonarr | Self::Radarr | Self::Lidarr | Self::Readarr => Capabilities {
                indexers: true,
                download_clients: true,
                import_lists: true,
                media_management: true,
                authentication: true,
                ..Capabilities::default()
            },
        }
    }
}

fn endpoint(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::QualityProfile => "qualityprofile",
        ResourceKind::Indexer => "indexer",
        ResourceKind::IndexerProxy => "indexerProxy",
        ResourceKind::DownloadClient => "downloadclient",
        ResourceKind::Application => "applications",
    }
}

#[derive(Debug, Deserialize)]
struct SystemStatus {
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthRecord {
    #[serde(default)]
    source: String,
    #[serde(rename = "type")]
    severity: HealthSeverity,
    #[serde(default)]
    message: String,
    #[serde(default)]
    wiki_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServarrAdapter {
    flavor: ServarrFlavor,
    http: reqwest::Client,
}

impl ServarrAdapter {
    pub fn new(flavor: ServarrFlavor, http: reqwest::Client) -> Self {
        Self { flavor, http }
    }

    fn client<'a>(&'a self, conn: &'a ConnectionDescriptor) -> ServarrClient<'a> {
        ServarrClient::new(&self.http, conn, self.flavor.api_prefix())
    }

    async fn apply_change(
        &self,
        client: &ServarrClient<'_>,
        change: &Change,
    ) -> Result<(), AdapterError> {
        match change {
            Change::Create { kind, item } => {
                let body = ProviderResource::from_item(item, None);
                client
                    .post(&format!("{}?forceSave=true", endpoint(*kind)), &body)
                    .await
            }
            Change::Update { kind, id, item } => {
                let body = ProviderResource::from_item(item, Some(*id));
                client
                    .put(&format!("{}/{id}?forceSave=true", endpoint(*kind)), &body)
                    .await
            }
            Change::Delete { kind, id, .. } => {
                client.delete(&format!("{}/{id}", endpoint(*kind))).await
            }
        }
    }

    async fn apply_import_lists(
        &self,
        client: &ServarrClient<'_>,
        lists: &[ConfigItem],
    ) -> Vec<String> {
        if lists.is_empty() {
            return Vec::new();
        }
        let existing: Vec<ProviderResource> = match client.get("importlist").await {
            Ok(existing) => existing,
            Err(e) => return vec![format!("list import lists: {e}")],
        };

        let mut failures = Vec::new();
        for list in lists {
            let current = existing
                .iter()
                .find(|r| r.name == list.name)
                .cloned()
                .and_then(ProviderResource::into_observed);
            let result = match current {
                Some(observed) if list.is_satisfied_by(&observed.item) => continue,
                Some(observed) => {
                    let body = ProviderResource::from_item(list, Some(observed.id));
                    client
                        .put(&format!("importlist/{}?forceSave=true", observed.id), &body)
                        .await
                }
                None => {
                    let body = ProviderResource::from_item(list, None);
                    client.post("importlist?forceSave=true", &body).await
                }
            };
            if let Err(e) = result {
                failures.push(format!("import list '{}': {e}", list.name));
            }
        }
        failures
    }

    async fn apply_config_section(
        &self,
        client: &ServarrClient<'_>,
        section: &str,
        updates: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), AdapterError> {
        let path = format!("config/{section}");
        let mut current: serde_json::Value = client.get(&path).await?;
        let Some(object) = current.as_object_mut() else {
            return Err(AdapterError::InvalidResponse {
                url: client.url(&path),
                detail: "expected a JSON object".to_string(),
            });
        };

        let mut changed = false;
        for (key, value) in updates {
            if object.get(key) != Some(value) {
                object.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        if !changed {
            debug!(section = section, "config section already matches");
            return Ok(());
        }

        let id = object
            .get("id")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(1);
        client.put(&format!("{path}/{id}"), &current).await
    }
}

fn host_auth_updates(auth: &AuthenticationSettings) -> serde_json::Map<String, serde_json::Value> {
    let mut updates = serde_json::Map::new();
    updates.insert("authenticationMethod".into(), auth.method.clone().into());
    if let Some(required) = &auth.required {
        updates.insert("authenticationRequired".into(), required.clone().into());
    }
    if let Some(username) = &auth.username {
        updates.insert("username".into(), username.clone().into());
    }
    if let Some(password) = &auth.password {
        updates.insert("password".into(), password.clone().into());
        updates.insert("passwordConfirmation".into(), password.clone().into());
    }
    updates
}

#[async_trait]
impl Adapter for ServarrAdapter {
    fn service_type(&self) -> &str {
        self.flavor.service_type()
    }

    async fn connect(&self, conn: &ConnectionDescriptor) -> Result<String, AdapterError> {
        let status: SystemStatus = self.client(conn).get("system/status").await?;
        Ok(status.version)
    }

    async fn discover(&self, _conn: &ConnectionDescriptor) -> Result<Capabilities, AdapterError> {
        Ok(self.flavor.capabilities())
    }

    async fn current_state(
        &self,
        conn: &ConnectionDescriptor,
    ) -> Result<ObservedState, AdapterError> {
        let client = self.client(conn);
        let capabilities = self.flavor.capabilities();
        let mut observed = ObservedState::default();
        for kind in ResourceKind::ALL {
            if !capabilities.supports(kind) {
                continue;
            }
            let resources: Vec<ProviderResource> = client.get(endpoint(kind)).await?;
            *observed.items_mut(kind) = resources
                .into_iter()
                .filter_map(ProviderResource::into_observed)
                .collect();
        }
        Ok(observed)
    }

    async fn apply(
        &self,
        conn: &ConnectionDescriptor,
        changes: &ChangeSet,
    ) -> Result<ApplyResult, AdapterError> {
        let client = self.client(conn);
        let capabilities = self.flavor.capabilities();
        let mut result = ApplyResult::default();

        for change in changes {
            if !capabilities.supports(change.kind()) {
                result.record_skipped();
                continue;
            }
            match self.apply_change(&client, change).await {
                Ok(()) => {
                    info!(service = self.flavor.service_type(), "✅ {change}");
                    result.record_applied();
                }
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => {
                    warn!(service = self.flavor.service_type(), "❌ {change}: {e}");
                    result.record_failed(change, e);
                }
            }
        }
        Ok(result)
    }

    fn as_direct_apply(&self) -> Option<&dyn DirectApply> {
        Some(self)
    }

    fn as_health_check(&self) -> Option<&dyn HealthCheck> {
        Some(self)
    }
}

#[async_trait]
impl DirectApply for ServarrAdapter {
    async fn direct_apply(
        &self,
        conn: &ConnectionDescriptor,
        desired: &DesiredState,
        capabilities: &Capabilities,
    ) -> Result<(), AdapterError> {
        let client = self.client(conn);
        let mut failures = Vec::new();

        if capabilities.import_lists {
            failures.extend(self.apply_import_lists(&client, &desired.import_lists).await);
        }

        if capabilities.media_management && !desired.media_management.is_empty() {
            let updates: serde_json::Map<String, serde_json::Value> = desired
                .media_management
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if let Err(e) = self
                .apply_config_section(&client, "mediamanagement", &updates)
                .await
            {
                failures.push(format!("media management: {e}"));
            }
        }

        if capabilities.authentication {
            if let Some(auth) = &desired.authentication {
                if let Err(e) = self
                    .apply_config_section(&client, "host", &host_auth_updates(auth))
                    .await
                {
                    failures.push(format!("authentication: {e}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AdapterError::Other(failures.join("; ")))
        }
    }
}

#[async_trait]
impl HealthCheck for ServarrAdapter {
    async fn health(&self, conn: &ConnectionDescriptor) -> Result<Vec<HealthIssue>, AdapterError> {
        let records: Vec<HealthRecord> = self.client(conn).get("health").await?;
        Ok(records
            .into_iter()
            .map(|r| HealthIssue {
                source: r.source,
                severity: r.severity,
                message: r.message,
                wiki_url: r.wiki_url,
            })
            .collect())
    }
}

/// Register one adapter per servarr flavor, sharing an HTTP connection pool
pub fn register_builtin_adapters(registry: &AdapterRegistry, http: &reqwest::Client) {
    for flavor in ServarrFlavor::ALL {
        registry.register(Arc::new(ServarrAdapter::new(flavor, http.clone())));
    }
}
