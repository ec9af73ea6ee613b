//! # Reconciler Tests
//!
//! Drives full passes through `reconcile` against in-memory collaborators:
//! finalizer handling, convergence, failure reporting, scheduling and
//! deletion cleanup.

mod common;

use common::{deleting, finalized, prowlarr, stored, Harness};
use kube_runtime::controller::Action;
use media_config_controller::adapter::{
    ConfigItem, HealthIssue, HealthSeverity, ObservedItem, ObservedState,
};
use media_config_controller::constants::RECONCILE_REQUEST_ANNOTATION;
use media_config_controller::controller::reconciler::{reconcile, ReconcilerError};
use media_config_controller::controller::registration::ApplicationRegistration;
use media_config_controller::controller::store::StatusUpdate;
use media_config_controller::crd::{
    AggregatorRef, ManagedResource, MediaServiceSpec, QualityProfileSpec, RegistrationStatus,
    ReconciliationSpec, ServiceStatus, SonarrConfig, SonarrConfigSpec,
};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn profile(name: &str) -> QualityProfileSpec {
    QualityProfileSpec {
        name: name.to_string(),
        cutoff: Some("Bluray-1080p".into()),
        qualities: vec!["HDTV-1080p".into(), "Bluray-1080p".into()],
        upgrade_allowed: true,
    }
}

fn sonarr_with(configure: impl FnOnce(&mut MediaServiceSpec)) -> SonarrConfig {
    let mut service = MediaServiceSpec::new("http://sonarr:8989", "sonarr-api-key");
    service.quality_profiles.push(profile("HD"));
    configure(&mut service);
    finalized(stored(SonarrConfig::new("tv", SonarrConfigSpec { service })))
}

fn sonarr() -> SonarrConfig {
    sonarr_with(|_| {})
}

fn harness(resource: SonarrConfig) -> Harness<SonarrConfig> {
    let harness = Harness::new(vec![resource]);
    harness
        .secrets
        .insert("sonarr-api-key", &[("apiKey", "sonarr-secret")]);
    harness
}

async fn run(harness: &Harness<SonarrConfig>) -> Result<Action, ReconcilerError> {
    let current = harness.store.object("tv").expect("resource exists");
    reconcile(Arc::new(current), Arc::clone(&harness.ctx)).await
}

fn status(harness: &Harness<SonarrConfig>) -> ServiceStatus {
    harness
        .store
        .object("tv")
        .and_then(|r| r.status)
        .expect("status written")
}

fn condition(status: &ServiceStatus, condition_type: &str) -> (String, String) {
    let condition = status
        .condition(condition_type)
        .unwrap_or_else(|| panic!("condition {condition_type} missing"));
    (
        condition.status.clone(),
        condition.reason.clone().unwrap_or_default(),
    )
}

fn pair(status: &str, reason: &str) -> (String, String) {
    (status.to_string(), reason.to_string())
}

#[tokio::test]
async fn test_first_pass_only_adds_finalizer() {
    let mut resource = sonarr();
    resource.metadata.finalizers = None;
    let harness = harness(resource);

    let action = run(&harness).await.unwrap();

    assert_eq!(action, Action::requeue(Duration::ZERO));
    let stored = harness.store.object("tv").unwrap();
    assert!(stored.has_finalizer());
    assert_eq!(harness.adapter.connect_count(), 0);
    assert_eq!(harness.store.status_write_count(), 0);
}

#[tokio::test]
async fn test_pass_converges_backend_and_reports_ready() {
    let harness = harness(sonarr());

    let action = run(&harness).await.unwrap();

    assert_eq!(
        action,
        Action::requeue(harness.ctx.config.default_reconcile_interval_duration())
    );
    assert_eq!(harness.adapter.applied(), vec!["create quality profile 'HD'"]);
    assert_eq!(
        harness.adapter.last_api_key.lock().unwrap().as_deref(),
        Some("sonarr-secret")
    );

    let status = status(&harness);
    assert_eq!(condition(&status, "Ready"), pair("True", "ReconciliationSucceeded"));
    assert_eq!(condition(&status, "Synced"), pair("True", "ChangesApplied"));
    assert_eq!(condition(&status, "Connected"), pair("True", "Connected"));
    assert!(status.connected);
    assert_eq!(status.service_version.as_deref(), Some("4.0.0"));
    assert_eq!(status.observed_generation, Some(1));
    assert!(status.last_applied_hash.is_some());
    assert!(status.last_reconcile_time.is_some());
    assert!(status.next_reconcile_time.is_some());
}

#[tokio::test]
async fn test_second_pass_is_already_in_sync() {
    let harness = harness(sonarr());
    run(&harness).await.unwrap();
    let first_hash = status(&harness).last_applied_hash;

    run(&harness).await.unwrap();

    let status = status(&harness);
    assert_eq!(condition(&status, "Synced"), pair("True", "AlreadyInSync"));
    assert_eq!(harness.adapter.applied().len(), 1);
    assert_eq!(status.last_applied_hash, first_hash);
}

#[tokio::test]
async fn test_identical_passes_keep_transition_times() {
    let harness = harness(sonarr());
    run(&harness).await.unwrap();
    let before = transition_times(&status(&harness));

    run(&harness).await.unwrap();
    run(&harness).await.unwrap();

    let after = transition_times(&status(&harness));
    assert_eq!(before.len(), 3);
    assert_eq!(after, before);
}

fn transition_times(status: &ServiceStatus) -> BTreeMap<String, Option<String>> {
    status
        .conditions
        .iter()
        .map(|c| (c.r#type.clone(), c.last_transition_time.clone()))
        .collect()
}

#[tokio::test]
async fn test_partial_apply_degrades_and_retries_on_error_interval() {
    let harness = harness(sonarr_with(|service| service.quality_profiles.push(profile("4K"))));
    harness
        .adapter
        .failing_items
        .lock()
        .unwrap()
        .insert("4K".to_string());

    let action = run(&harness).await.unwrap();

    assert_eq!(
        action,
        Action::requeue(harness.ctx.config.reconciliation_error_requeue_duration())
    );
    let status = status(&harness);
    assert_eq!(condition(&status, "Ready"), pair("False", "PartiallyApplied"));
    assert_eq!(condition(&status, "Synced"), pair("False", "PartiallyApplied"));
    assert!(status.last_applied_hash.is_none());
    assert_eq!(harness.adapter.applied(), vec!["create quality profile 'HD'"]);
}

#[tokio::test]
async fn test_connection_failure_marks_disconnected() {
    let harness = harness(sonarr());
    *harness.adapter.connect_failure.lock().unwrap() = Some("connection refused".into());

    let action = run(&harness).await.unwrap();

    assert_eq!(
        action,
        Action::requeue(harness.ctx.config.reconciliation_error_requeue_duration())
    );
    let status = status(&harness);
    assert_eq!(condition(&status, "Ready"), pair("False", "ConnectionFailed"));
    assert_eq!(condition(&status, "Connected"), pair("False", "ConnectionFailed"));
    assert!(!status.connected);
    assert!(harness.adapter.applied().is_empty());
}

#[tokio::test]
async fn test_missing_secret_stops_before_connecting() {
    let harness = Harness::new(vec![sonarr()]);

    run(&harness).await.unwrap();

    let status = status(&harness);
    assert_eq!(
        condition(&status, "Ready"),
        pair("False", "SecretResolutionFailed")
    );
    assert_eq!(harness.adapter.connect_count(), 0);
}

#[tokio::test]
async fn test_duplicate_names_fail_compilation() {
    let harness = harness(sonarr_with(|service| service.quality_profiles.push(profile("HD"))));

    run(&harness).await.unwrap();

    let status = status(&harness);
    assert_eq!(condition(&status, "Ready"), pair("False", "CompilationFailed"));
    assert!(harness.adapter.applied().is_empty());
}

#[tokio::test]
async fn test_apply_failure_persists_status_then_errors() {
    let harness = harness(sonarr());
    *harness.adapter.apply_failure.lock().unwrap() = Some("backend returned 503".into());

    let result = run(&harness).await;

    assert!(matches!(result, Err(ReconcilerError::Apply(_))));
    let status = status(&harness);
    assert_eq!(condition(&status, "Synced"), pair("False", "ApplyFailed"));
    assert_eq!(condition(&status, "Ready"), pair("False", "ApplyFailed"));
}

#[tokio::test]
async fn test_status_write_failure_escapes_pass() {
    let harness = harness(sonarr());
    harness.store.fail_status_writes.store(true, Ordering::SeqCst);

    let result = run(&harness).await;

    assert!(matches!(result, Err(ReconcilerError::StatusWrite(_))));
}

#[tokio::test]
async fn test_suspended_resource_is_left_alone() {
    let harness = harness(sonarr_with(|service| {
        service.reconciliation = Some(ReconciliationSpec {
            suspend: true,
            interval: None,
        });
    }));

    let action = run(&harness).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(harness.adapter.connect_count(), 0);
    assert_eq!(harness.store.status_write_count(), 0);
}

#[tokio::test]
async fn test_suspended_resource_is_still_released_on_deletion() {
    let harness = harness(deleting(sonarr_with(|service| {
        service.reconciliation = Some(ReconciliationSpec {
            suspend: true,
            interval: None,
        });
    })));

    let action = run(&harness).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert!(harness.store.object("tv").is_none());
}

#[tokio::test]
async fn test_custom_interval_drives_requeue() {
    let harness = harness(sonarr_with(|service| {
        service.reconciliation = Some(ReconciliationSpec {
            suspend: false,
            interval: Some("10m".into()),
        });
    }));

    let action = run(&harness).await.unwrap();

    assert_eq!(action, Action::requeue(Duration::from_secs(600)));
}

#[tokio::test]
async fn test_unparseable_interval_falls_back_to_default() {
    let harness = harness(sonarr_with(|service| {
        service.reconciliation = Some(ReconciliationSpec {
            suspend: false,
            interval: Some("soon".into()),
        });
    }));

    let action = run(&harness).await.unwrap();

    assert_eq!(
        action,
        Action::requeue(harness.ctx.config.default_reconcile_interval_duration())
    );
}

#[tokio::test]
async fn test_manual_request_is_recorded_as_handled() {
    let mut resource = sonarr();
    resource.metadata.annotations = Some(BTreeMap::from([(
        RECONCILE_REQUEST_ANNOTATION.to_string(),
        "2026-03-01T12:00:00Z".to_string(),
    )]));
    let harness = harness(resource);

    run(&harness).await.unwrap();

    assert_eq!(
        status(&harness).last_handled_reconcile_at.as_deref(),
        Some("2026-03-01T12:00:00Z")
    );
}

#[tokio::test]
async fn test_engine_status_write_never_carries_registration() {
    let mut resource = sonarr();
    resource.status = Some(ServiceStatus {
        registration: Some(RegistrationStatus {
            registered: true,
            aggregator_name: Some("prowlarr".into()),
            ..RegistrationStatus::default()
        }),
        ..ServiceStatus::default()
    });
    let harness = harness(resource);

    run(&harness).await.unwrap();

    let writes = harness.store.status_writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    match &writes[0] {
        StatusUpdate::Service(status) => assert!(status.registration.is_none()),
        other => panic!("unexpected status update {other:?}"),
    }
    // The coordinator's record survives the engine's write
    assert!(status(&harness).registration.is_some_and(|r| r.registered));
}

#[tokio::test]
async fn test_health_issues_raise_warning_events() {
    let harness = harness(sonarr());
    *harness.adapter.health.lock().unwrap() = Some(vec![
        HealthIssue {
            source: "IndexerStatusCheck".into(),
            severity: HealthSeverity::Error,
            message: "All indexers are unavailable".into(),
            wiki_url: None,
        },
        HealthIssue {
            source: "UpdateCheck".into(),
            severity: HealthSeverity::Notice,
            message: "New update available".into(),
            wiki_url: None,
        },
    ]);

    run(&harness).await.unwrap();

    assert_eq!(harness.events.reasons(), vec!["HealthError"]);
    let health = status(&harness).health.expect("health recorded");
    assert_eq!(health.issue_count, 2);
    assert_eq!(health.errors, 1);
    assert_eq!(health.notices, 1);
}

#[tokio::test]
async fn test_deletion_removes_managed_items_and_finalizer() {
    let mut resource = sonarr();
    resource.status = Some(ServiceStatus {
        managed_items: BTreeMap::from([("indexers".to_string(), vec!["nzbgeek".to_string()])]),
        ..ServiceStatus::default()
    });
    let harness = harness(deleting(resource));
    let synced = ObservedItem {
        id: 8,
        item: ConfigItem::new("NZBgeek (Prowlarr)", "Newznab"),
    };
    harness.adapter.observed.lock().unwrap().indexers = vec![
        ObservedItem {
            id: 7,
            item: ConfigItem::new("nzbgeek", "Newznab"),
        },
        synced.clone(),
    ];

    let action = run(&harness).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(harness.adapter.applied(), vec!["delete indexer 'nzbgeek'"]);
    assert_eq!(
        harness.adapter.observed.lock().unwrap().clone(),
        ObservedState {
            indexers: vec![synced],
            ..ObservedState::default()
        }
    );
    assert!(harness.store.object("tv").is_none());
}

#[tokio::test]
async fn test_pass_records_owned_items_and_leaves_synced_indexers() {
    let harness = harness(sonarr());
    harness.adapter.observed.lock().unwrap().indexers = vec![ObservedItem {
        id: 4,
        item: ConfigItem::new("NZBgeek (Prowlarr)", "Newznab"),
    }];

    run(&harness).await.unwrap();
    run(&harness).await.unwrap();

    assert_eq!(harness.adapter.applied(), vec!["create quality profile 'HD'"]);
    assert_eq!(harness.adapter.observed.lock().unwrap().indexers.len(), 1);
    let status = status(&harness);
    assert_eq!(
        status.managed_items,
        BTreeMap::from([("qualityProfiles".to_string(), vec!["HD".to_string()])])
    );
}

#[tokio::test]
async fn test_removed_profile_is_deleted_once_owned() {
    let harness = harness(sonarr_with(|service| service.quality_profiles.push(profile("4K"))));
    run(&harness).await.unwrap();

    let mut resource = harness.store.object("tv").unwrap();
    resource.spec.service.quality_profiles.retain(|p| p.name == "HD");
    harness.store.put(resource);
    run(&harness).await.unwrap();

    assert_eq!(
        harness.adapter.applied(),
        vec![
            "create quality profile 'HD'",
            "create quality profile '4K'",
            "delete quality profile '4K'",
        ]
    );
    assert_eq!(
        status(&harness).managed_items.get("qualityProfiles"),
        Some(&vec!["HD".to_string()])
    );
}

fn application(id: i64, name: &str, implementation: &str) -> ObservedItem {
    ObservedItem {
        id,
        item: ConfigItem::new(name, implementation),
    }
}

#[tokio::test]
async fn test_aggregator_pass_keeps_pull_registered_applications() {
    let mut resource = finalized(prowlarr("prowlarr"));
    resource.status = Some(ServiceStatus {
        managed_items: BTreeMap::from([(
            "applications".to_string(),
            vec!["retired".to_string()],
        )]),
        ..ServiceStatus::default()
    });
    let harness = Harness::new(vec![resource]);
    harness
        .secrets
        .insert("prowlarr-api-key", &[("apiKey", "prowlarr-secret")]);
    harness.adapter.observed.lock().unwrap().applications = vec![
        application(1, "retired", "Radarr"),
        application(2, "tv", "Sonarr"),
    ];

    let current = harness.store.object("prowlarr").expect("resource exists");
    reconcile(Arc::new(current), Arc::clone(&harness.ctx)).await.unwrap();
    let current = harness.store.object("prowlarr").expect("resource exists");
    reconcile(Arc::new(current), Arc::clone(&harness.ctx)).await.unwrap();

    assert_eq!(harness.adapter.applied(), vec!["delete application 'retired'"]);
    let remaining: Vec<String> = harness
        .adapter
        .observed
        .lock()
        .unwrap()
        .applications
        .iter()
        .map(|a| a.item.name.clone())
        .collect();
    assert_eq!(remaining, vec!["tv"]);
    let status = harness.store.object("prowlarr").and_then(|r| r.status).unwrap();
    assert!(status.managed_items.is_empty());
    assert_eq!(condition(&status, "Synced"), pair("True", "AlreadyInSync"));
}

#[tokio::test]
async fn test_deletion_proceeds_when_backend_is_unreachable() {
    let harness = harness(deleting(sonarr()));
    *harness.adapter.connect_failure.lock().unwrap() = Some("no route to host".into());

    let action = run(&harness).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert!(harness.store.object("tv").is_none());
}

#[tokio::test]
async fn test_deletion_unregisters_from_aggregator() {
    let resource = deleting(sonarr_with(|service| {
        service.aggregator_ref = Some(AggregatorRef {
            name: "prowlarr".into(),
            auto_register: true,
            sync_categories: Vec::new(),
            sync_level: None,
        });
    }));
    let harness = Harness::with_aggregators(vec![resource], vec![prowlarr("prowlarr")]);
    harness
        .secrets
        .insert("sonarr-api-key", &[("apiKey", "sonarr-secret")]);
    harness
        .secrets
        .insert("prowlarr-api-key", &[("apiKey", "prowlarr-secret")]);
    harness
        .aggregator
        .client
        .apps
        .lock()
        .unwrap()
        .push(ApplicationRegistration {
            id: Some(3),
            name: "tv".into(),
            implementation: "Sonarr".into(),
            config_contract: "SonarrSettings".into(),
            sync_level: "fullSync".into(),
            fields: Vec::new(),
            tags: Vec::new(),
        });

    run(&harness).await.unwrap();

    assert_eq!(harness.aggregator.client.count(), 0);
    assert_eq!(
        harness.aggregator.requested.lock().unwrap().clone(),
        vec!["http://prowlarr:9696"]
    );
    assert!(harness.store.object("tv").is_none());
}

#[tokio::test]
async fn test_deletion_without_finalizer_does_nothing() {
    let mut resource = deleting(sonarr());
    resource.metadata.finalizers = Some(vec!["other.example.com/finalizer".into()]);
    let harness = harness(resource);

    let action = run(&harness).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(harness.adapter.connect_count(), 0);
    assert!(harness.store.object("tv").is_some());
}
