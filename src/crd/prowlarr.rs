//! # Aggregator Kind
//!
//! `ProwlarrConfig` configures the indexer aggregator. Besides its own indexers
//! and download clients it can push downstream applications (`applications`),
//! which is the push side of the registration model.

use crate::crd::common::{
    ApplicationSpec, AuthenticationSpec, ConnectionSpec, DownloadClientSpec, IndexerProxySpec,
    IndexerSpec, ReconciliationSpec,
};
use crate::crd::status::ServiceStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "config.mediastack.io",
    version = "v1alpha1",
    kind = "ProwlarrConfig",
    namespaced,
    status = "ServiceStatus",
    shortname = "prowlarrcfg",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Connected","type":"boolean","jsonPath":".status.connected"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProwlarrConfigSpec {
    pub connection: ConnectionSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<ReconciliationSpec>,
    #[serde(default)]
    pub indexers: Vec<IndexerSpec>,
    #[serde(default)]
    pub indexer_proxies: Vec<IndexerProxySpec>,
    /// Downstream applications registered by the aggregator itself
    #[serde(default)]
    pub applications: Vec<ApplicationSpec>,
    #[serde(default)]
    pub download_clients: Vec<DownloadClientSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSpec>,
}

impl ProwlarrConfigSpec {
    /// True when `applications` already declares `(service_type, name)`
    pub fn declares_application(&self, service_type: &str, name: &str) -> bool {
        self.applications
            .iter()
            .any(|app| app.service_type.eq_ignore_ascii_case(service_type) && app.name == name)
    }
}
