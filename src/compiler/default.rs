//! Default compiler for the servarr family.

use crate::adapter::{AuthenticationSettings, ConfigItem, DesiredState};
use crate::compiler::{CompileError, CompileInput, Compiler};
use crate::controller::secrets::{keys, ResolvedSecrets};
use crate::crd::{
    ApplicationSpec, DownloadClientSpec, ImportListSpec, IndexerProxySpec, IndexerSpec,
    QualityProfileSpec,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Compiles specs into the servarr-shaped item model
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCompiler;

impl Compiler for DefaultCompiler {
    fn compile(&self, input: &CompileInput<'_>) -> Result<DesiredState, CompileError> {
        let capabilities = input.capabilities;
        let secrets = input.secrets;
        let mut desired = DesiredState::default();

        if capabilities.quality_profiles {
            desired.quality_profiles = input
                .quality_profiles
                .iter()
                .map(quality_profile)
                .collect();
            ensure_unique("quality profile", &desired.quality_profiles)?;
        }

        if capabilities.indexers {
            desired.indexers = input
                .indexers
                .iter()
                .map(|spec| indexer(spec, secrets))
                .collect::<Result<_, _>>()?;
            ensure_unique("indexer", &desired.indexers)?;
        }

        if capabilities.indexer_proxies {
            desired.indexer_proxies = input
                .indexer_proxies
                .iter()
                .map(|spec| indexer_proxy(spec, secrets))
                .collect::<Result<_, _>>()?;
            ensure_unique("indexer proxy", &desired.indexer_proxies)?;
        }

        if capabilities.download_clients {
            desired.download_clients = input
                .download_clients
                .iter()
                .map(|spec| download_client(spec, input.service_type, secrets))
                .collect::<Result<_, _>>()?;
            ensure_unique("download client", &desired.download_clients)?;
        }

        if capabilities.applications {
            desired.applications = input
                .applications
                .iter()
                .map(|spec| application(spec, secrets))
                .collect::<Result<_, _>>()?;
            ensure_unique("application", &desired.applications)?;
        }

        if capabilities.import_lists {
            desired.import_lists = input
                .import_lists
                .iter()
                .map(|spec| import_list(spec, secrets))
                .collect();
            ensure_unique("import list", &desired.import_lists)?;
        }

        if capabilities.media_management {
            if let Some(settings) = input.media_management {
                desired.media_management = settings.clone();
            }
        }

        if capabilities.authentication {
            if let Some(auth) = input.authentication {
                let has_credentials = auth.credentials_secret_ref.is_some();
                desired.authentication = Some(AuthenticationSettings {
                    method: auth.method.as_str().to_string(),
                    required: auth.required.clone(),
                    username: has_credentials
                        .then(|| require(secrets, &keys::authentication("username")))
                        .transpose()?,
                    password: has_credentials
                        .then(|| require(secrets, &keys::authentication("password")))
                        .transpose()?,
                });
            }
        }

        desired.content_hash = content_hash(&desired)?;
        Ok(desired)
    }
}

/// SHA-256 over the canonical JSON of every compiled section
pub fn content_hash(desired: &DesiredState) -> Result<String, CompileError> {
    let mut canonical = serde_json::to_value(desired)?;
    if let Some(object) = canonical.as_object_mut() {
        object.remove("content_hash");
    }
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Categories synced to a service when none are declared
pub fn default_sync_categories(service_type: &str) -> &'static [i32] {
    match service_type.to_ascii_lowercase().as_str() {
        "sonarr" => &[5000, 5010, 5020, 5030, 5040, 5045, 5050],
        "radarr" => &[2000, 2010, 2020, 2030, 2040, 2045, 2050, 2060],
        "lidarr" => &[3000, 3010, 3030, 3040],
        "readarr" => &[7000, 7010, 7020, 7030],
        _ => &[],
    }
}

/// Implementation name the aggregator uses for a downstream service type
pub fn application_implementation(service_type: &str) -> Option<&'static str> {
    match service_type.to_ascii_lowercase().as_str() {
        "sonarr" => Some("Sonarr"),
        "radarr" => Some("Radarr"),
        "lidarr" => Some("Lidarr"),
        "readarr" => Some("Readarr"),
        _ => None,
    }
}

fn require(secrets: &ResolvedSecrets, key: &str) -> Result<String, CompileError> {
    secrets
        .get(key)
        .map(str::to_string)
        .ok_or_else(|| CompileError::MissingSecret(key.to_string()))
}

fn ensure_unique(section: &'static str, items: &[ConfigItem]) -> Result<(), CompileError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.name.as_str()) {
            return Err(CompileError::DuplicateName {
                section,
                name: item.name.clone(),
            });
        }
    }
    Ok(())
}

fn download_protocol(implementation: &str) -> Option<&'static str> {
    match implementation.to_ascii_lowercase().as_str() {
        "qbittorrent" | "transmission" | "deluge" | "rtorrent" | "flood" | "utorrent"
        | "aria2" | "vuze" | "hadouken" => Some("torrent"),
        "sabnzbd" | "nzbget" | "nzbvortex" => Some("usenet"),
        _ => None,
    }
}

fn indexer_protocol(implementation: &str) -> Option<&'static str> {
    match implementation.to_ascii_lowercase().as_str() {
        "newznab" => Some("usenet"),
        "torznab" => Some("torrent"),
        _ => None,
    }
}

fn category_field(service_type: &str) -> &'static str {
    match service_type {
        "sonarr" => "tvCategory",
        "radarr" => "movieCategory",
        "lidarr" => "musicCategory",
        "readarr" => "bookCategory",
        _ => "category",
    }
}

fn quality_profile(spec: &QualityProfileSpec) -> ConfigItem {
    let mut item = ConfigItem::new(&spec.name, "QualityProfile")
        .with_field("items", json!(spec.qualities))
        .with_field("upgradeAllowed", json!(spec.upgrade_allowed));
    if let Some(cutoff) = &spec.cutoff {
        item.fields.insert("cutoff".into(), json!(cutoff));
    }
    item
}

fn indexer(spec: &IndexerSpec, secrets: &ResolvedSecrets) -> Result<ConfigItem, CompileError> {
    let mut item = ConfigItem::new(&spec.name, &spec.implementation);
    item.enabled = spec.enabled;
    item.priority = spec.priority;
    item.fields.extend(spec.fields.clone());

    if let Some(base_url) = &spec.base_url {
        item.fields.insert("baseUrl".into(), json!(base_url));
    }
    if spec.api_key_secret_ref.is_some() {
        let api_key = require(secrets, &keys::indexer_api_key(&spec.name))?;
        item.fields.insert("apiKey".into(), json!(api_key));
    }
    if !spec.categories.is_empty() {
        item.fields.insert("categories".into(), json!(spec.categories));
    }
    if let Some(protocol) = indexer_protocol(&spec.implementation) {
        item.properties.insert("protocol".into(), json!(protocol));
    }
    Ok(item)
}

fn indexer_proxy(
    spec: &IndexerProxySpec,
    secrets: &ResolvedSecrets,
) -> Result<ConfigItem, CompileError> {
    let mut item = ConfigItem::new(&spec.name, &spec.implementation);
    item.fields.extend(spec.fields.clone());

    if let Some(host) = &spec.host {
        item.fields.insert("host".into(), json!(host));
    }
    if let Some(port) = spec.port {
        item.fields.insert("port".into(), json!(port));
    }
    if spec.credentials_secret_ref.is_some() {
        for field in ["username", "password"] {
            let value = require(secrets, &keys::indexer_proxy(&spec.name, field))?;
            item.fields.insert(field.into(), json!(value));
        }
    }
    Ok(item)
}

fn download_client(
    spec: &DownloadClientSpec,
    service_type: &str,
    secrets: &ResolvedSecrets,
) -> Result<ConfigItem, CompileError> {
    if spec.host.trim().is_empty() {
        return Err(CompileError::Invalid {
            section: "download client",
            name: spec.name.clone(),
            reason: "host must not be empty".into(),
        });
    }
    if spec.port == 0 {
        return Err(CompileError::Invalid {
            section: "download client",
            name: spec.name.clone(),
            reason: "port must be greater than zero".into(),
        });
    }

    let mut item = ConfigItem::new(&spec.name, &spec.implementation);
    item.enabled = spec.enabled;
    item.priority = spec.priority;
    item.fields.extend(spec.fields.clone());
    item.fields.insert("host".into(), json!(spec.host));
    item.fields.insert("port".into(), json!(spec.port));
    item.fields.insert("useSsl".into(), json!(spec.use_ssl));

    if let Some(category) = &spec.category {
        item.fields
            .insert(category_field(service_type).into(), json!(category));
    }
    if spec.credentials_secret_ref.is_some() {
        for field in ["username", "password"] {
            let value = require(secrets, &keys::download_client(&spec.name, field))?;
            item.fields.insert(field.into(), json!(value));
        }
    }
    if spec.api_key_secret_ref.is_some() {
        let api_key = require(secrets, &keys::download_client(&spec.name, "apiKey"))?;
        item.fields.insert("apiKey".into(), json!(api_key));
    }
    if let Some(protocol) = download_protocol(&spec.implementation) {
        item.properties.insert("protocol".into(), json!(protocol));
    }
    Ok(item)
}

fn application(
    spec: &ApplicationSpec,
    secrets: &ResolvedSecrets,
) -> Result<ConfigItem, CompileError> {
    let implementation =
        application_implementation(&spec.service_type).ok_or_else(|| CompileError::Invalid {
            section: "application",
            name: spec.name.clone(),
            reason: format!("unknown service type '{}'", spec.service_type),
        })?;

    let categories = if spec.sync_categories.is_empty() {
        default_sync_categories(&spec.service_type).to_vec()
    } else {
        spec.sync_categories.clone()
    };

    let mut item = ConfigItem::new(&spec.name, implementation)
        .with_field("baseUrl", json!(spec.url))
        .with_field(
            "apiKey",
            json!(require(secrets, &keys::application_api_key(&spec.name))?),
        )
        .with_field("syncCategories", json!(categories));
    if let Some(prowlarr_url) = &spec.prowlarr_url {
        item.fields.insert("prowlarrUrl".into(), json!(prowlarr_url));
    }
    item.properties.insert(
        "syncLevel".into(),
        json!(spec.sync_level.as_deref().unwrap_or("fullSync")),
    );
    Ok(item)
}

fn import_list(spec: &ImportListSpec, secrets: &ResolvedSecrets) -> ConfigItem {
    let mut item = ConfigItem::new(&spec.name, &spec.implementation);
    item.enabled = spec.enabled;
    item.fields.extend(spec.fields.clone());
    let prefix = keys::import_list_prefix(&spec.name);
    for (key, value) in secrets.with_prefix(&prefix) {
        item.fields.insert(key.to_string(), json!(value));
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Capabilities;
    use crate::crd::{
        CredentialsSecretRef, DownloadClientSpec, MediaServiceSpec, SecretKeyRef, SonarrConfig,
        SonarrConfigSpec,
    };
    use std::collections::BTreeMap;

    fn qbit() -> DownloadClientSpec {
        DownloadClientSpec {
            name: "qbit".into(),
            implementation: "QBittorrent".into(),
            enabled: true,
            priority: Some(1),
            host: "qbittorrent".into(),
            port: 8080,
            use_ssl: false,
            category: Some("tv".into()),
            credentials_secret_ref: Some(CredentialsSecretRef {
                name: "qbit".into(),
                username_key: None,
                password_key: None,
            }),
            api_key_secret_ref: None,
            fields: BTreeMap::new(),
        }
    }

    fn sonarr() -> SonarrConfig {
        let mut service = MediaServiceSpec::new("http://sonarr:8989", "sonarr-api-key");
        service.download_clients.push(qbit());
        service.quality_profiles.push(QualityProfileSpec {
            name: "HD".into(),
            cutoff: Some("Bluray-1080p".into()),
            qualities: vec!["HDTV-1080p".into(), "Bluray-1080p".into()],
            upgrade_allowed: true,
        });
        SonarrConfig::new("sonarr", SonarrConfigSpec { service })
    }

    fn secrets() -> ResolvedSecrets {
        let mut secrets = ResolvedSecrets::new();
        secrets.insert(keys::CONNECTION_API_KEY, "abc".into());
        secrets.insert(keys::download_client("qbit", "username"), "admin".into());
        secrets.insert(keys::download_client("qbit", "password"), "hunter2".into());
        secrets
    }

    #[test]
    fn test_download_client_compiles_credentials_and_protocol() {
        let resource = sonarr();
        let secrets = secrets();
        let capabilities = Capabilities::all();
        let desired = DefaultCompiler
            .compile(&CompileInput::from_resource(&resource, &secrets, &capabilities))
            .unwrap();

        let client = &desired.download_clients[0];
        assert_eq!(client.fields["password"], json!("hunter2"));
        assert_eq!(client.fields["tvCategory"], json!("tv"));
        assert_eq!(client.properties["protocol"], json!("torrent"));
        assert_eq!(desired.content_hash.len(), 64);
    }

    #[test]
    fn test_unsupported_sections_compile_to_nothing() {
        let resource = sonarr();
        let secrets = secrets();
        let capabilities = Capabilities {
            download_clients: true,
            ..Capabilities::default()
        };
        let desired = DefaultCompiler
            .compile(&CompileInput::from_resource(&resource, &secrets, &capabilities))
            .unwrap();

        assert!(desired.quality_profiles.is_empty());
        assert_eq!(desired.download_clients.len(), 1);
    }

    #[test]
    fn test_hash_is_stable_and_input_sensitive() {
        let resource = sonarr();
        let secrets = secrets();
        let capabilities = Capabilities::all();
        let input = CompileInput::from_resource(&resource, &secrets, &capabilities);
        let first = DefaultCompiler.compile(&input).unwrap();
        let second = DefaultCompiler.compile(&input).unwrap();
        assert_eq!(first.content_hash, second.content_hash);

        let mut changed = sonarr();
        changed.spec.service.download_clients[0].port = 9090;
        let third = DefaultCompiler
            .compile(&CompileInput::from_resource(&changed, &secrets, &capabilities))
            .unwrap();
        assert_ne!(first.content_hash, third.content_hash);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut resource = sonarr();
        resource.spec.service.download_clients.push(qbit());
        let secrets = secrets();
        let capabilities = Capabilities::all();
        let err = DefaultCompiler
            .compile(&CompileInput::from_resource(&resource, &secrets, &capabilities))
            .unwrap_err();
        assert!(matches!(err, CompileError::DuplicateName { name, .. } if name == "qbit"));
    }

    #[test]
    fn test_missing_resolved_secret_is_an_error() {
        let resource = sonarr();
        let mut secrets = ResolvedSecrets::new();
        secrets.insert(keys::CONNECTION_API_KEY, "abc".into());
        let capabilities = Capabilities::all();
        let err = DefaultCompiler
            .compile(&CompileInput::from_resource(&resource, &secrets, &capabilities))
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingSecret(_)));
    }

    #[test]
    fn test_application_defaults_categories_and_sync_level() {
        let spec = ApplicationSpec {
            name: "sonarr".into(),
            service_type: "sonarr".into(),
            url: "http://sonarr:8989".into(),
            prowlarr_url: None,
            api_key_secret_ref: SecretKeyRef {
                name: "sonarr-api-key".into(),
                key: None,
            },
            sync_level: None,
            sync_categories: Vec::new(),
        };
        let mut secrets = ResolvedSecrets::new();
        secrets.insert(keys::application_api_key("sonarr"), "abc".into());

        let item = application(&spec, &secrets).unwrap();
        assert_eq!(item.implementation, "Sonarr");
        assert_eq!(item.properties["syncLevel"], json!("fullSync"));
        assert_eq!(
            item.fields["syncCategories"],
            json!(default_sync_categories("sonarr"))
        );
    }
}
