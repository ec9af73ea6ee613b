//! # Compiler
//!
//! Turns a resource's declarative sections plus its resolved secrets into a
//! service-agnostic [`DesiredState`]. Sections the backend does not support
//! are compiled to nothing, and the result carries a content hash so that
//! identical inputs are recognisable across passes.

mod default;

pub use default::{application_implementation, content_hash, default_sync_categories, DefaultCompiler};

use crate::adapter::{Capabilities, DesiredState};
use crate::controller::secrets::ResolvedSecrets;
use crate::crd::{
    ApplicationSpec, AuthenticationSpec, DownloadClientSpec, ImportListSpec, IndexerProxySpec,
    IndexerSpec, ManagedResource, QualityProfileSpec,
};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("resolved secret '{0}' is missing")]
    MissingSecret(String),
    #[error("duplicate {section} name '{name}'")]
    DuplicateName { section: &'static str, name: String },
    #[error("invalid {section} '{name}': {reason}")]
    Invalid {
        section: &'static str,
        name: String,
        reason: String,
    },
    #[error("failed to hash desired state: {0}")]
    Hash(#[from] serde_json::Error),
}

/// Everything the compiler reads for one pass
#[derive(Debug)]
pub struct CompileInput<'a> {
    pub service_type: &'a str,
    pub quality_profiles: &'a [QualityProfileSpec],
    pub indexers: &'a [IndexerSpec],
    pub indexer_proxies: &'a [IndexerProxySpec],
    pub applications: &'a [ApplicationSpec],
    pub download_clients: &'a [DownloadClientSpec],
    pub import_lists: &'a [ImportListSpec],
    pub media_management: Option<&'a BTreeMap<String, serde_json::Value>>,
    pub authentication: Option<&'a AuthenticationSpec>,
    pub secrets: &'a ResolvedSecrets,
    pub capabilities: &'a Capabilities,
}

impl<'a> CompileInput<'a> {
    pub fn from_resource<K: ManagedResource>(
        resource: &'a K,
        secrets: &'a ResolvedSecrets,
        capabilities: &'a Capabilities,
    ) -> Self {
        Self {
            service_type: K::SERVICE_TYPE,
            quality_profiles: resource.quality_profiles(),
            indexers: resource.indexers(),
            indexer_proxies: resource.indexer_proxies(),
            applications: resource.applications(),
            download_clients: resource.download_clients(),
            import_lists: resource.import_lists(),
            media_management: resource.media_management(),
            authentication: resource.authentication(),
            secrets,
            capabilities,
        }
    }
}

pub trait Compiler: Send + Sync {
    fn compile(&self, input: &CompileInput<'_>) -> Result<DesiredState, CompileError>;
}
