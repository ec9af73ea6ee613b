//! # Managed Resource Capability
//!
//! The reconciliation engine is written once and drives every service kind
//! through [`ManagedResource`]. Each kind exposes its declarative sections,
//! status and finalizer name; sections a kind does not have read as empty.

use crate::crd::common::{
    AggregatorRef, ApplicationSpec, AuthenticationSpec, ConnectionSpec, DownloadClientSpec,
    ImportListSpec, IndexerProxySpec, IndexerSpec, QualityProfileSpec, ReconciliationSpec,
};
use crate::crd::media::{
    LidarrConfig, MediaServiceSpec, RadarrConfig, ReadarrConfig, SonarrConfig,
};
use crate::crd::prowlarr::ProwlarrConfig;
use crate::crd::status::ServiceStatus;
use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

pub trait ManagedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Adapter key, e.g. `sonarr`
    const SERVICE_TYPE: &'static str;
    /// Finalizer guarding backend cleanup
    const FINALIZER: &'static str;

    fn connection(&self) -> &ConnectionSpec;
    fn reconciliation(&self) -> Option<&ReconciliationSpec>;
    fn indexers(&self) -> &[IndexerSpec];
    fn download_clients(&self) -> &[DownloadClientSpec];
    fn authentication(&self) -> Option<&AuthenticationSpec>;

    fn quality_profiles(&self) -> &[QualityProfileSpec] {
        &[]
    }

    fn indexer_proxies(&self) -> &[IndexerProxySpec] {
        &[]
    }

    fn applications(&self) -> &[ApplicationSpec] {
        &[]
    }

    fn import_lists(&self) -> &[ImportListSpec] {
        &[]
    }

    fn media_management(&self) -> Option<&BTreeMap<String, serde_json::Value>> {
        None
    }

    fn aggregator_ref(&self) -> Option<&AggregatorRef> {
        None
    }

    fn service_status(&self) -> Option<&ServiceStatus>;
    fn service_status_mut(&mut self) -> &mut Option<ServiceStatus>;

    fn is_suspended(&self) -> bool {
        self.reconciliation().is_some_and(|r| r.suspend)
    }

    /// Pull-style registration is requested and enabled
    fn should_register_with_aggregator(&self) -> bool {
        self.aggregator_ref().is_some_and(|r| r.auto_register)
    }

    fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == Self::FINALIZER)
    }

    fn is_being_deleted(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }
}

macro_rules! media_service_resource {
    ($kind:ty, $service_type:literal, $plural:literal) => {
        impl $kind {
            pub fn service(&self) -> &MediaServiceSpec {
                &self.spec.service
            }
        }

        impl ManagedResource for $kind {
            const SERVICE_TYPE: &'static str = $service_type;
            const FINALIZER: &'static str = concat!($plural, ".config.mediastack.io/finalizer");

            fn connection(&self) -> &ConnectionSpec {
                &self.spec.service.connection
            }

            fn reconciliation(&self) -> Option<&ReconciliationSpec> {
                self.spec.service.reconciliation.as_ref()
            }

            fn indexers(&self) -> &[IndexerSpec] {
                &self.spec.service.indexers
            }

            fn download_clients(&self) -> &[DownloadClientSpec] {
                &self.spec.service.download_clients
            }

            fn authentication(&self) -> Option<&AuthenticationSpec> {
                self.spec.service.authentication.as_ref()
            }

            fn quality_profiles(&self) -> &[QualityProfileSpec] {
                &self.spec.service.quality_profiles
            }

            fn import_lists(&self) -> &[ImportListSpec] {
                &self.spec.service.import_lists
            }

            fn media_management(&self) -> Option<&BTreeMap<String, serde_json::Value>> {
                self.spec.service.media_management.as_ref()
            }

            fn aggregator_ref(&self) -> Option<&AggregatorRef> {
                self.spec.service.aggregator_ref.as_ref()
            }

            fn service_status(&self) -> Option<&ServiceStatus> {
                self.status.as_ref()
            }

            fn service_status_mut(&mut self) -> &mut Option<ServiceStatus> {
                &mut self.status
            }
        }
    };
}

media_service_resource!(SonarrConfig, "sonarr", "sonarrconfigs");
media_service_resource!(RadarrConfig, "radarr", "radarrconfigs");
media_service_resource!(LidarrConfig, "lidarr", "lidarrconfigs");
media_service_resource!(ReadarrConfig, "readarr", "readarrconfigs");

impl ManagedResource for ProwlarrConfig {
    const SERVICE_TYPE: &'static str = "prowlarr";
    const FINALIZER: &'static str = "prowlarrconfigs.config.mediastack.io/finalizer";

    fn connection(&self) -> &ConnectionSpec {
        &self.spec.connection
    }

    fn reconciliation(&self) -> Option<&ReconciliationSpec> {
        self.spec.reconciliation.as_ref()
    }

    fn indexers(&self) -> &[IndexerSpec] {
        &self.spec.indexers
    }

    fn download_clients(&self) -> &[DownloadClientSpec] {
        &self.spec.download_clients
    }

    fn authentication(&self) -> Option<&AuthenticationSpec> {
        self.spec.authentication.as_ref()
    }

    fn indexer_proxies(&self) -> &[IndexerProxySpec] {
        &self.spec.indexer_proxies
    }

    fn applications(&self) -> &[ApplicationSpec] {
        &self.spec.applications
    }

    fn service_status(&self) -> Option<&ServiceStatus> {
        self.status.as_ref()
    }

    fn service_status_mut(&mut self) -> &mut Option<ServiceStatus> {
        &mut self.status
    }
}
