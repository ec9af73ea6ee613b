//! # CRD Validation Tests
//!
//! Deserializes sample manifests for every kind and checks the generated
//! CustomResourceDefinitions, so schema drift shows up before a cluster does.

use kube::CustomResourceExt;
use media_config_controller::constants::{API_GROUP, API_VERSION};
use media_config_controller::crd::{
    AuthenticationMethod, LidarrConfig, ManagedResource, ProwlarrConfig, RadarrConfig,
    ReadarrConfig, SonarrConfig,
};

#[test]
fn test_sonarr_config_with_all_sections() {
    let yaml = r#"
apiVersion: config.mediastack.io/v1alpha1
kind: SonarrConfig
metadata:
  name: tv
  namespace: media
spec:
  connection:
    url: http://sonarr.media.svc:8989
    apiKeySecretRef:
      name: sonarr-api-key
    timeoutSeconds: 20
  reconciliation:
    interval: 10m
  qualityProfiles:
    - name: HD
      cutoff: Bluray-1080p
      qualities: [HDTV-1080p, WEBDL-1080p, Bluray-1080p]
  indexers:
    - name: nzbgeek
      implementation: Newznab
      baseUrl: https://api.nzbgeek.info
      apiKeySecretRef:
        name: nzbgeek
      categories: [5030, 5040]
  downloadClients:
    - name: qbittorrent
      implementation: QBittorrent
      host: qbittorrent.media.svc
      port: 8080
      category: tv
      credentialsSecretRef:
        name: qbittorrent-credentials
  importLists:
    - name: trakt
      implementation: TraktListImport
      settingsSecretRef: trakt-settings
      fields:
        listName: watchlist
  mediaManagement:
    recycleBin: /data/recycle
    createEmptySeriesFolders: false
  authentication:
    method: forms
    required: enabled
    credentialsSecretRef:
      name: sonarr-admin
  aggregatorRef:
    name: prowlarr
    syncCategories: [5000, 5040]
"#;

    let config: SonarrConfig =
        serde_yaml::from_str(yaml).expect("Should deserialize SonarrConfig with all sections");
    let spec = config.service();

    assert_eq!(spec.connection.api_key_secret_ref.key_or("apiKey"), "apiKey");
    assert_eq!(spec.connection.timeout_seconds, Some(20));
    assert_eq!(
        spec.reconciliation.as_ref().and_then(|r| r.interval.as_deref()),
        Some("10m")
    );
    assert!(spec.quality_profiles[0].upgrade_allowed);
    assert_eq!(spec.indexers[0].categories, vec![5030, 5040]);
    assert!(spec.indexers[0].enabled);
    assert_eq!(spec.download_clients[0].port, 8080);
    assert!(!spec.download_clients[0].use_ssl);
    assert_eq!(
        spec.import_lists[0].settings_secret_ref.as_deref(),
        Some("trakt-settings")
    );
    assert_eq!(spec.media_management.as_ref().map(|m| m.len()), Some(2));
    assert_eq!(
        spec.authentication.as_ref().map(|a| a.method),
        Some(AuthenticationMethod::Forms)
    );

    let aggregator = config.aggregator_ref().expect("aggregatorRef is set");
    assert!(aggregator.auto_register);
    assert!(aggregator.sync_level.is_none());
    assert!(config.should_register_with_aggregator());
    assert!(!config.is_suspended());
}

#[test]
fn test_minimal_downstream_kinds() {
    let manifest = |kind: &str| {
        format!(
            r#"
apiVersion: config.mediastack.io/v1alpha1
kind: {kind}
metadata:
  name: library
spec:
  connection:
    url: http://backend:8686
    apiKeySecretRef:
      name: backend-api-key
      key: token
  reconciliation:
    suspend: true
"#
        )
    };

    let radarr: RadarrConfig = serde_yaml::from_str(&manifest("RadarrConfig")).unwrap();
    let lidarr: LidarrConfig = serde_yaml::from_str(&manifest("LidarrConfig")).unwrap();
    let readarr: ReadarrConfig = serde_yaml::from_str(&manifest("ReadarrConfig")).unwrap();

    assert!(radarr.is_suspended());
    assert!(lidarr.is_suspended());
    assert_eq!(
        readarr.connection().api_key_secret_ref.key_or("apiKey"),
        "token"
    );
    assert!(readarr.aggregator_ref().is_none());
    assert!(readarr.service().indexers.is_empty());
}

#[test]
fn test_prowlarr_config_with_push_applications() {
    let yaml = r#"
apiVersion: config.mediastack.io/v1alpha1
kind: ProwlarrConfig
metadata:
  name: prowlarr
  namespace: media
spec:
  connection:
    url: http://prowlarr.media.svc:9696
    apiKeySecretRef:
      name: prowlarr-api-key
  indexers:
    - name: 1337x
      implementation: Cardigann
      fields:
        definitionFile: 1337x
  indexerProxies:
    - name: flaresolverr
      implementation: FlareSolverr
      host: http://flaresolverr:8191
  applications:
    - name: movies
      serviceType: Radarr
      url: http://radarr.media.svc:7878
      apiKeySecretRef:
        name: radarr-api-key
      syncLevel: addOnly
"#;

    let config: ProwlarrConfig =
        serde_yaml::from_str(yaml).expect("Should deserialize ProwlarrConfig");

    assert_eq!(config.spec.indexer_proxies.len(), 1);
    assert_eq!(config.spec.applications[0].sync_level.as_deref(), Some("addOnly"));
    assert!(config.spec.declares_application("radarr", "movies"));
    assert!(config.aggregator_ref().is_none());
}

#[test]
fn test_missing_connection_is_rejected() {
    let yaml = r#"
apiVersion: config.mediastack.io/v1alpha1
kind: SonarrConfig
metadata:
  name: broken
spec:
  indexers: []
"#;

    assert!(serde_yaml::from_str::<SonarrConfig>(yaml).is_err());
}

#[test]
fn test_generated_crds_share_group_and_have_status() {
    let crds = [
        SonarrConfig::crd(),
        RadarrConfig::crd(),
        LidarrConfig::crd(),
        ReadarrConfig::crd(),
        ProwlarrConfig::crd(),
    ];

    for crd in &crds {
        assert_eq!(crd.spec.group, API_GROUP);
        assert_eq!(crd.spec.scope, "Namespaced");
        let version = &crd.spec.versions[0];
        assert_eq!(version.name, API_VERSION);
        assert!(version
            .subresources
            .as_ref()
            .is_some_and(|s| s.status.is_some()));
    }

    assert_eq!(crds[0].spec.names.kind, "SonarrConfig");
    assert_eq!(
        crds[4].spec.names.short_names.as_deref(),
        Some(&["prowlarrcfg".to_string()][..])
    );
}

#[test]
fn test_finalizer_names_follow_plural() {
    assert_eq!(
        SonarrConfig::FINALIZER,
        "sonarrconfigs.config.mediastack.io/finalizer"
    );
    assert_eq!(
        ProwlarrConfig::FINALIZER,
        "prowlarrconfigs.config.mediastack.io/finalizer"
    );
    assert_eq!(RadarrConfig::SERVICE_TYPE, "radarr");
}
