//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, Kubernetes client setup and the per-kind contexts.

use crate::adapter::servarr::register_builtin_adapters;
use crate::adapter::AdapterRegistry;
use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::controller::registration::RegistrationCoordinator;
use crate::controller::server::{start_server, ServerState};
use crate::crd::{
    LidarrConfig, ManagedResource, ProwlarrConfig, RadarrConfig, ReadarrConfig, SonarrConfig,
};
use crate::observability;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Shared context for every controller the watch loop runs
#[derive(Debug)]
pub struct ControllerContexts {
    pub sonarr: Arc<Reconciler<SonarrConfig>>,
    pub radarr: Arc<Reconciler<RadarrConfig>>,
    pub lidarr: Arc<Reconciler<LidarrConfig>>,
    pub readarr: Arc<Reconciler<ReadarrConfig>>,
    pub prowlarr: Arc<Reconciler<ProwlarrConfig>>,
    pub coordinator: Arc<RegistrationCoordinator>,
}

impl ControllerContexts {
    pub fn new(
        client: &Client,
        http: &reqwest::Client,
        adapters: &Arc<AdapterRegistry>,
        config: &ControllerConfig,
    ) -> Self {
        fn context<K: ManagedResource>(
            client: &Client,
            http: &reqwest::Client,
            adapters: &Arc<AdapterRegistry>,
            config: &ControllerConfig,
        ) -> Arc<Reconciler<K>> {
            Arc::new(Reconciler::new(
                client.clone(),
                http.clone(),
                Arc::clone(adapters),
                config.clone(),
            ))
        }

        Self {
            sonarr: context(client, http, adapters, config),
            radarr: context(client, http, adapters, config),
            lidarr: context(client, http, adapters, config),
            readarr: context(client, http, adapters, config),
            prowlarr: context(client, http, adapters, config),
            coordinator: Arc::new(RegistrationCoordinator::new(
                client.clone(),
                http.clone(),
                config.clone(),
            )),
        }
    }
}

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Per-kind reconciler contexts and the registration coordinator
    pub contexts: ControllerContexts,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self.server_state.is_ready.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes and backend HTTP client creation
/// - Adapter registration
/// - Reconciler contexts
pub async fn initialize() -> Result<InitializationResult> {
    // Configure rustls crypto provider FIRST, before any other operations
    // Required for rustls 0.23+ when no default provider is set via features
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    let config = ControllerConfig::from_env();
    observability::logging::init_tracing(&config)?;

    info!("Starting media configuration controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        controller_namespace = %config.controller_namespace,
        watch_namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        max_concurrent_reconciliations = config.max_concurrent_reconciliations,
        "Controller configuration"
    );

    if config.enable_metrics {
        observability::metrics::register_metrics()?;
    }

    let server_state = Arc::new(ServerState::default());

    // Start HTTP server for metrics and probes
    // We start it in a background task but wait for it to be listening before proceeding
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let adapters = AdapterRegistry::global();
    register_builtin_adapters(&adapters, &http);
    info!(adapters = ?adapters.service_types(), "Registered adapters");

    let contexts = ControllerContexts::new(&client, &http, &adapters, &config);

    log_startup_summary::<SonarrConfig>(&client, &config).await;
    log_startup_summary::<RadarrConfig>(&client, &config).await;
    log_startup_summary::<LidarrConfig>(&client, &config).await;
    log_startup_summary::<ReadarrConfig>(&client, &config).await;
    log_startup_summary::<ProwlarrConfig>(&client, &config).await;

    server_state.is_ready.store(true, Ordering::Relaxed);
    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        contexts,
        server_state,
        config,
    })
}

/// Wait for the HTTP server to bind its listener
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.server_poll_interval_ms);
    let start_time = Instant::now();

    loop {
        // Check if server task crashed
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_listening.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Tabulate existing resources of one kind by namespace for operations visibility.
/// A kind whose CRD is not installed is reported and otherwise ignored.
async fn log_startup_summary<K: ManagedResource>(client: &Client, config: &ControllerConfig) {
    let api: Api<K> = match &config.watch_namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    match api.list(&ListParams::default()).await {
        Ok(list) => {
            let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for item in &list.items {
                by_namespace
                    .entry(item.namespace().unwrap_or_default())
                    .or_default()
                    .push(item.name_any());
            }
            info!(
                service.type = K::SERVICE_TYPE,
                total = list.items.len(),
                namespaces = by_namespace.len(),
                "Startup resource summary"
            );
            for (namespace, names) in &by_namespace {
                info!(
                    service.type = K::SERVICE_TYPE,
                    namespace = %namespace,
                    resources = %names.join(", "),
                    "Existing resources"
                );
            }
        }
        Err(e) => warn!(
            service.type = K::SERVICE_TYPE,
            error = %e,
            "Cannot list resources, is the CRD installed?"
        ),
    }
}
