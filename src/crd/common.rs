//! # Shared Spec Types
//!
//! Building blocks shared by every service kind: connection details, secret
//! references, and the declarative sections that describe backend configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference to a single key inside a Kubernetes Secret in the resource's namespace
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    /// Name of the Secret
    pub name: String,
    /// Key within the Secret. Each consumer documents its default key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl SecretKeyRef {
    /// Key to read, falling back to `default` when none is declared
    pub fn key_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.key.as_deref().unwrap_or(default)
    }
}

/// Reference to a Secret holding a username/password pair
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsSecretRef {
    /// Name of the Secret
    pub name: String,
    /// Key holding the username (default `username`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_key: Option<String>,
    /// Key holding the password (default `password`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_key: Option<String>,
}

/// How to reach the backend service
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
    /// Base URL of the service, e.g. `http://sonarr.media.svc:8989`
    pub url: String,
    /// Secret holding the service API key (default key `apiKey`)
    pub api_key_secret_ref: SecretKeyRef,
    /// Per-request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Reconciliation tuning
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSpec {
    /// Pause all reconciliation for this resource
    #[serde(default)]
    pub suspend: bool,
    /// Re-check interval after a successful pass, e.g. `5m`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

/// A quality profile
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfileSpec {
    pub name: String,
    /// Quality that stops upgrades once reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<String>,
    /// Allowed qualities, highest preference last
    #[serde(default)]
    pub qualities: Vec<String>,
    #[serde(default = "default_true")]
    pub upgrade_allowed: bool,
}

/// An indexer (newznab/torznab or a named aggregator definition)
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexerSpec {
    pub name: String,
    /// Backend implementation identifier, e.g. `Newznab` or `Torznab`
    pub implementation: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Secret holding the indexer API key (default key `apiKey`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_secret_ref: Option<SecretKeyRef>,
    #[serde(default)]
    pub categories: Vec<i32>,
    /// Additional backend-specific settings, passed through verbatim
    #[serde(default)]
    #[schemars(schema_with = "crate::crd::schema::free_form_object")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// A download client
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadClientSpec {
    pub name: String,
    /// Backend implementation identifier, e.g. `QBittorrent` or `Sabnzbd`
    pub implementation: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub use_ssl: bool,
    /// Category/label applied to grabbed releases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_ref: Option<CredentialsSecretRef>,
    /// Secret holding the client API key (default key `apiKey`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_secret_ref: Option<SecretKeyRef>,
    #[serde(default)]
    #[schemars(schema_with = "crate::crd::schema::free_form_object")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// An import list
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportListSpec {
    pub name: String,
    pub implementation: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Secret whose every key is merged into the list's settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_secret_ref: Option<String>,
    #[serde(default)]
    #[schemars(schema_with = "crate::crd::schema::free_form_object")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// Authentication method for the service's own web UI/API
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationMethod {
    #[default]
    None,
    Basic,
    Forms,
    External,
}

impl AuthenticationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic => "basic",
            Self::Forms => "forms",
            Self::External => "external",
        }
    }
}

/// Host authentication settings
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSpec {
    #[serde(default)]
    pub method: AuthenticationMethod,
    /// `enabled` or `disabledForLocalAddresses`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_ref: Option<CredentialsSecretRef>,
}

/// Pull-style request for registration with an aggregator
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorRef {
    /// Name of the ProwlarrConfig in the same namespace
    pub name: String,
    /// Register automatically (default true)
    #[serde(default = "default_true")]
    pub auto_register: bool,
    /// Categories synced to this service; service defaults when empty
    #[serde(default)]
    pub sync_categories: Vec<i32>,
    /// `fullSync`, `addOnly` or `disabled` (default `fullSync`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_level: Option<String>,
}

/// An indexer proxy (aggregator only)
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexerProxySpec {
    pub name: String,
    /// Backend implementation identifier, e.g. `FlareSolverr` or `Http`
    pub implementation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_ref: Option<CredentialsSecretRef>,
    #[serde(default)]
    #[schemars(schema_with = "crate::crd::schema::free_form_object")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// A downstream application pushed by the aggregator (push-style registration)
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Application name; matched against downstream resource names for conflicts
    pub name: String,
    /// `sonarr`, `radarr`, `lidarr` or `readarr`
    pub service_type: String,
    /// Base URL of the downstream service
    pub url: String,
    /// URL the downstream service uses to reach the aggregator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prowlarr_url: Option<String>,
    /// Secret holding the downstream API key (default key `apiKey`)
    pub api_key_secret_ref: SecretKeyRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_level: Option<String>,
    #[serde(default)]
    pub sync_categories: Vec<i32>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregator_ref_defaults_to_auto_register() {
        let parsed: AggregatorRef = serde_json::from_value(serde_json::json!({
            "name": "prowlarr"
        }))
        .unwrap();
        assert!(parsed.auto_register);
        assert!(parsed.sync_categories.is_empty());
    }

    #[test]
    fn test_secret_key_ref_default_key() {
        let reference = SecretKeyRef {
            name: "sonarr".into(),
            key: None,
        };
        assert_eq!(reference.key_or("apiKey"), "apiKey");
        let reference = SecretKeyRef {
            name: "sonarr".into(),
            key: Some("token".into()),
        };
        assert_eq!(reference.key_or("apiKey"), "token");
    }

    #[test]
    fn test_authentication_method_serializes_camel_case() {
        let value = serde_json::to_value(AuthenticationMethod::Forms).unwrap();
        assert_eq!(value, serde_json::json!("forms"));
    }
}
