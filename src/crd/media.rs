//! # Downstream Service Kinds
//!
//! `SonarrConfig`, `RadarrConfig`, `LidarrConfig` and `ReadarrConfig` share one
//! spec shape; only the kind (and therefore the backend adapter) differs.
//!
//! ```yaml
//! apiVersion: config.mediastack.io/v1alpha1
//! kind: SonarrConfig
//! metadata:
//!   name: sonarr
//!   namespace: media
//! spec:
//!   connection:
//!     url: http://sonarr.media.svc:8989
//!     apiKeySecretRef:
//!       name: sonarr-api-key
//!   downloadClients:
//!     - name: qbittorrent
//!       implementation: QBittorrent
//!       host: qbittorrent.media.svc
//!       port: 8080
//!       credentialsSecretRef:
//!         name: qbittorrent-credentials
//!   aggregatorRef:
//!     name: prowlarr
//! ```

use crate::crd::common::{
    AggregatorRef, AuthenticationSpec, ConnectionSpec, DownloadClientSpec, ImportListSpec,
    IndexerSpec, QualityProfileSpec, ReconciliationSpec,
};
use crate::crd::status::ServiceStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative configuration shared by every downstream service kind
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaServiceSpec {
    pub connection: ConnectionSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<ReconciliationSpec>,
    #[serde(default)]
    pub quality_profiles: Vec<QualityProfileSpec>,
    #[serde(default)]
    pub indexers: Vec<IndexerSpec>,
    #[serde(default)]
    pub download_clients: Vec<DownloadClientSpec>,
    #[serde(default)]
    pub import_lists: Vec<ImportListSpec>,
    /// Media management settings merged into the service's configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::crd::schema::optional_free_form_object")]
    pub media_management: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSpec>,
    /// Aggregator this service asks to be registered with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator_ref: Option<AggregatorRef>,
}

impl MediaServiceSpec {
    /// Minimal spec pointing at `url` with the API key in `api_key_secret`
    pub fn new(url: impl Into<String>, api_key_secret: impl Into<String>) -> Self {
        Self {
            connection: ConnectionSpec {
                url: url.into(),
                api_key_secret_ref: crate::crd::common::SecretKeyRef {
                    name: api_key_secret.into(),
                    key: None,
                },
                timeout_seconds: None,
            },
            reconciliation: None,
            quality_profiles: Vec::new(),
            indexers: Vec::new(),
            download_clients: Vec::new(),
            import_lists: Vec::new(),
            media_management: None,
            authentication: None,
            aggregator_ref: None,
        }
    }
}

/// Sonarr (TV series)
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "config.mediastack.io",
    version = "v1alpha1",
    kind = "SonarrConfig",
    namespaced,
    status = "ServiceStatus",
    shortname = "sonarrcfg",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.serviceVersion"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct SonarrConfigSpec {
    #[serde(flatten)]
    pub service: MediaServiceSpec,
}

/// Radarr (movies)
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "config.mediastack.io",
    version = "v1alpha1",
    kind = "RadarrConfig",
    namespaced,
    status = "ServiceStatus",
    shortname = "radarrcfg",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.serviceVersion"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct RadarrConfigSpec {
    #[serde(flatten)]
    pub service: MediaServiceSpec,
}

/// Lidarr (music)
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "config.mediastack.io",
    version = "v1alpha1",
    kind = "LidarrConfig",
    namespaced,
    status = "ServiceStatus",
    shortname = "lidarrcfg",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.serviceVersion"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct LidarrConfigSpec {
    #[serde(flatten)]
    pub service: MediaServiceSpec,
}

/// Readarr (books)
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "config.mediastack.io",
    version = "v1alpha1",
    kind = "ReadarrConfig",
    namespaced,
    status = "ServiceStatus",
    shortname = "readarrcfg",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.serviceVersion"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct ReadarrConfigSpec {
    #[serde(flatten)]
    pub service: MediaServiceSpec,
}
