//! # Adapter Data Model
//!
//! Service-agnostic representation of backend configuration. The compiler
//! produces a [`DesiredState`], adapters report an [`ObservedState`], and the
//! difference between the two is a [`ChangeSet`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use zeroize::Zeroize;

/// Everything an adapter needs to talk to one backend instance
#[derive(Clone)]
pub struct ConnectionDescriptor {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl ConnectionDescriptor {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Drop for ConnectionDescriptor {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

/// Kinds of backend configuration that are converged through diff and apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    QualityProfile,
    Indexer,
    IndexerProxy,
    DownloadClient,
    Application,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::QualityProfile,
        ResourceKind::Indexer,
        ResourceKind::IndexerProxy,
        ResourceKind::DownloadClient,
        ResourceKind::Application,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::QualityProfile => "quality profile",
            Self::Indexer => "indexer",
            Self::IndexerProxy => "indexer proxy",
            Self::DownloadClient => "download client",
            Self::Application => "application",
        }
    }

    /// Key under which ownership of this kind is recorded in status
    pub fn key(self) -> &'static str {
        match self {
            Self::QualityProfile => "qualityProfiles",
            Self::Indexer => "indexers",
            Self::IndexerProxy => "indexerProxies",
            Self::DownloadClient => "downloadClients",
            Self::Application => "applications",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a backend instance supports, as reported by discovery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub quality_profiles: bool,
    pub indexers: bool,
    pub indexer_proxies: bool,
    pub download_clients: bool,
    pub applications: bool,
    pub import_lists: bool,
    pub media_management: bool,
    pub authentication: bool,
}

impl Capabilities {
    /// Every capability enabled
    pub fn all() -> Self {
        Self {
            quality_profiles: true,
            indexers: true,
            indexer_proxies: true,
            download_clients: true,
            applications: true,
            import_lists: true,
            media_management: true,
            authentication: true,
        }
    }

    pub fn supports(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::QualityProfile => self.quality_profiles,
            ResourceKind::Indexer => self.indexers,
            ResourceKind::IndexerProxy => self.indexer_proxies,
            ResourceKind::DownloadClient => self.download_clients,
            ResourceKind::Application => self.applications,
        }
    }
}

/// One named configuration item in the service-agnostic model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub name: String,
    pub implementation: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Implementation settings
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Top-level item properties such as `protocol` or `syncLevel`
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ConfigItem {
    pub fn new(name: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implementation: implementation.into(),
            enabled: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Whether an observed item already satisfies this desired item.
    ///
    /// Fields and properties the backend does not report (write-only secrets are
    /// masked and dropped by adapters) are not compared.
    pub fn is_satisfied_by(&self, observed: &ConfigItem) -> bool {
        if !self.implementation.eq_ignore_ascii_case(&observed.implementation)
            || self.enabled != observed.enabled
        {
            return false;
        }
        if self.priority.is_some() && self.priority != observed.priority {
            return false;
        }
        subset_matches(&self.fields, &observed.fields)
            && subset_matches(&self.properties, &observed.properties)
    }
}

fn subset_matches(
    desired: &BTreeMap<String, serde_json::Value>,
    observed: &BTreeMap<String, serde_json::Value>,
) -> bool {
    desired.iter().all(|(key, value)| {
        observed
            .get(key)
            .is_none_or(|current| current == value)
    })
}

/// An item as it exists on the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedItem {
    pub id: i64,
    pub item: ConfigItem,
}

/// Host authentication settings
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationSettings {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for AuthenticationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationSettings")
            .field("method", &self.method)
            .field("required", &self.required)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Drop for AuthenticationSettings {
    fn drop(&mut self) {
        if let Some(password) = self.password.as_mut() {
            password.zeroize();
        }
    }
}

/// Compiled desired configuration for one backend instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    pub quality_profiles: Vec<ConfigItem>,
    pub indexers: Vec<ConfigItem>,
    pub indexer_proxies: Vec<ConfigItem>,
    pub download_clients: Vec<ConfigItem>,
    pub applications: Vec<ConfigItem>,
    pub import_lists: Vec<ConfigItem>,
    pub media_management: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSettings>,
    /// SHA-256 over everything above, hex encoded
    #[serde(default)]
    pub content_hash: String,
}

impl DesiredState {
    /// The state that declares nothing; diffing against it deletes every owned item
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items(&self, kind: ResourceKind) -> &[ConfigItem] {
        match kind {
            ResourceKind::QualityProfile => &self.quality_profiles,
            ResourceKind::Indexer => &self.indexers,
            ResourceKind::IndexerProxy => &self.indexer_proxies,
            ResourceKind::DownloadClient => &self.download_clients,
            ResourceKind::Application => &self.applications,
        }
    }
}

/// Backend configuration as currently observed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    pub quality_profiles: Vec<ObservedItem>,
    pub indexers: Vec<ObservedItem>,
    pub indexer_proxies: Vec<ObservedItem>,
    pub download_clients: Vec<ObservedItem>,
    pub applications: Vec<ObservedItem>,
}

impl ObservedState {
    pub fn items(&self, kind: ResourceKind) -> &[ObservedItem] {
        match kind {
            ResourceKind::QualityProfile => &self.quality_profiles,
            ResourceKind::Indexer => &self.indexers,
            ResourceKind::IndexerProxy => &self.indexer_proxies,
            ResourceKind::DownloadClient => &self.download_clients,
            ResourceKind::Application => &self.applications,
        }
    }

    pub fn items_mut(&mut self, kind: ResourceKind) -> &mut Vec<ObservedItem> {
        match kind {
            ResourceKind::QualityProfile => &mut self.quality_profiles,
            ResourceKind::Indexer => &mut self.indexers,
            ResourceKind::IndexerProxy => &mut self.indexer_proxies,
            ResourceKind::DownloadClient => &mut self.download_clients,
            ResourceKind::Application => &mut self.applications,
        }
    }
}

/// Names of backend items a resource created or adopted, per kind.
///
/// Only owned items are ever deleted. Items a resource never declared, such as
/// indexers synced in by an aggregator, applications other resources registered
/// or anything added by hand, are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ownership {
    names: BTreeMap<ResourceKind, BTreeSet<String>>,
}

impl Ownership {
    pub fn owns(&self, kind: ResourceKind, name: &str) -> bool {
        self.names
            .get(&kind)
            .is_some_and(|names| names.contains(name))
    }

    pub fn insert(&mut self, kind: ResourceKind, name: impl Into<String>) {
        self.names.entry(kind).or_default().insert(name.into());
    }

    pub fn is_empty(&self) -> bool {
        self.names.values().all(BTreeSet::is_empty)
    }

    /// Rebuild from the status record. Unknown keys are ignored.
    pub fn from_records(records: &BTreeMap<String, Vec<String>>) -> Self {
        let mut ownership = Self::default();
        for kind in ResourceKind::ALL {
            for name in records.get(kind.key()).into_iter().flatten() {
                ownership.insert(kind, name.clone());
            }
        }
        ownership
    }

    pub fn to_records(&self) -> BTreeMap<String, Vec<String>> {
        self.names
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(kind, names)| (kind.key().to_string(), names.iter().cloned().collect()))
            .collect()
    }

    /// Ownership once `changes` have been applied.
    ///
    /// Every desired item is owned. A previously owned item stays owned while it
    /// still exists, unless its delete went through. Without a `result` (apply
    /// never reported back) no delete is assumed to have succeeded. Kinds the
    /// backend does not support keep their previous record.
    pub fn after_apply(
        &self,
        observed: &ObservedState,
        desired: &DesiredState,
        capabilities: &Capabilities,
        changes: &ChangeSet,
        result: Option<&ApplyResult>,
    ) -> Self {
        let mut next = Self::default();
        for kind in ResourceKind::ALL {
            if !capabilities.supports(kind) {
                if let Some(names) = self.names.get(&kind) {
                    next.names.insert(kind, names.clone());
                }
                continue;
            }
            for existing in observed.items(kind) {
                if self.owns(kind, &existing.item.name) {
                    next.insert(kind, existing.item.name.clone());
                }
            }
            for item in desired.items(kind) {
                next.insert(kind, item.name.clone());
            }
        }

        let Some(result) = result else {
            return next;
        };
        for change in changes {
            if let Change::Delete { kind, name, .. } = change {
                if !result.failed_for(*kind, name) {
                    if let Some(names) = next.names.get_mut(kind) {
                        names.remove(name);
                    }
                }
            }
        }
        next
    }
}

/// A single create, update or delete against the backend
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Create { kind: ResourceKind, item: ConfigItem },
    Update { kind: ResourceKind, id: i64, item: ConfigItem },
    Delete { kind: ResourceKind, id: i64, name: String },
}

impl Change {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Create { kind, .. } | Self::Update { kind, .. } | Self::Delete { kind, .. } => {
                *kind
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Create { item, .. } | Self::Update { item, .. } => &item.name,
            Self::Delete { name, .. } => name,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}'", self.verb(), self.kind(), self.name())
    }
}

/// Ordered list of changes that converges observed state toward desired state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    /// Kinds touched by at least one change
    pub fn kinds(&self) -> BTreeSet<ResourceKind> {
        self.changes.iter().map(Change::kind).collect()
    }

    pub fn for_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |c| c.kind() == kind)
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Per-change outcome of an apply call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyResult {
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<ChangeFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFailure {
    pub kind: ResourceKind,
    pub name: String,
    pub change: String,
    pub error: String,
}

impl ApplyResult {
    pub fn record_applied(&mut self) {
        self.applied += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_failed(&mut self, change: &Change, error: impl fmt::Display) {
        self.failed += 1;
        self.errors.push(ChangeFailure {
            kind: change.kind(),
            name: change.name().to_string(),
            change: change.to_string(),
            error: error.to_string(),
        });
    }

    pub fn total(&self) -> usize {
        self.applied + self.failed + self.skipped
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn failed_for(&self, kind: ResourceKind, name: &str) -> bool {
        self.errors.iter().any(|f| f.kind == kind && f.name == name)
    }

    /// One-line summary suitable for a condition message
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} applied, {} failed, {} skipped",
            self.applied, self.failed, self.skipped
        );
        if let Some(first) = self.errors.first() {
            summary.push_str(&format!("; first failure: {}: {}", first.change, first.error));
        }
        summary
    }
}

/// Severity of a backend health issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthSeverity {
    Ok,
    Notice,
    Warning,
    Error,
}

impl HealthSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthIssue {
    pub source: String,
    pub severity: HealthSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_url: Option<String>,
}
