use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use upkeep_core::prelude::*;
use upkeep_core::{
    failure_summary, ChannelSink, LedgerStatus, NullSink, RecordingSink, UpdateEvents, UpdateExecutor,
    UpdatePlanner,
};
use upkeep_ledger::{InstallationCeiling, LegacyDescriptor};
use upkeep_unit::MigrationRegistry;
use upkeep_test_utils::{
    counting_unit, failing_unit, init_test_tracing, legacy_state, legacy_store, optional_unit,
    pending_record, season6, seeded_store, unit, units, GameConfig, SEASON6_DESCRIPTOR,
};

fn registry(units: Vec<Arc<dyn MigrationUnit<GameConfig>>>) -> Arc<UnitRegistry<GameConfig>> {
    Arc::new(UnitRegistry::with_units(units).unwrap())
}

fn service(store: &MemoryStore<GameConfig>, registry: Arc<UnitRegistry<GameConfig>>) -> UpdateService<GameConfig> {
    UpdateService::new(Arc::new(store.clone()), registry, UpdateConfig::default()).unwrap()
}

fn versions(vs: &[u32]) -> Vec<Version> {
    vs.iter().copied().map(Version).collect()
}

#[tokio::test]
async fn test_fresh_legacy_store_end_to_end() {
    init_test_tracing();
    let store = legacy_store(SEASON6_DESCRIPTOR);
    let service = service(&store, registry(units(&season6(), &[1, 2, 3])));
    let mut events = service.events().subscribe();
    let sink = RecordingSink::new();

    let report = service.install_mandatory(&sink).await.unwrap();

    assert_eq!(report.installed, versions(&[1, 2, 3]));
    assert_eq!(
        sink.events(),
        vec![
            UpdateProgress::Started(Version(1)),
            UpdateProgress::Completed(Version(1)),
            UpdateProgress::Started(Version(2)),
            UpdateProgress::Completed(Version(2)),
            UpdateProgress::Started(Version(3)),
            UpdateProgress::Completed(Version(3)),
            UpdateProgress::Finished,
        ]
    );

    let event = events.recv().await.unwrap();
    assert_eq!(event.lineage, season6());
    assert_eq!(event.versions, versions(&[1, 2, 3]));
    assert!(events.try_recv().is_err());

    let state = store.state();
    assert_eq!(state.configuration.unwrap().applied, vec![1, 2, 3]);
    assert_eq!(
        state.ceiling.unwrap(),
        InstallationCeiling::new().raise(Version(3), season6())
    );
    assert_eq!(store.commit_count(), 3);
}

#[tokio::test]
async fn test_second_pass_is_idempotent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = legacy_store(SEASON6_DESCRIPTOR);
    let registry = registry(vec![
        counting_unit(&season6(), 1, Arc::clone(&calls)),
        counting_unit(&season6(), 2, Arc::clone(&calls)),
    ]);
    let service = service(&store, registry);

    service.install_mandatory(&NullSink).await.unwrap();
    let plan = service.plan(PlanMode::Mandatory).await.unwrap();
    assert!(plan.is_empty());

    let report = service.install_mandatory(&NullSink).await.unwrap();
    assert!(report.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_late_registered_lower_version_is_planned() {
    let store = seeded_store(&season6(), &[1, 2, 3, 5, 7]);
    let service = service(&store, registry(units(&season6(), &[1, 2, 3, 4, 5, 7])));

    let plan = service.plan(PlanMode::Mandatory).await.unwrap();
    assert_eq!(plan.versions(), versions(&[4]));

    service.install(plan.units(), &NullSink).await.unwrap();

    let state = store.state();
    assert_eq!(state.installed_versions(), versions(&[1, 2, 3, 4, 5, 7]));
    // Ceiling stays at the highest version
    assert_eq!(state.ceiling.unwrap().current_installed_version, Some(Version(7)));
}

#[tokio::test]
async fn test_partial_failure_is_resumable() {
    let lineage = season6();
    let store = seeded_store(&lineage, &[1, 2, 3]);
    let broken = registry(vec![
        unit(&lineage, 4),
        failing_unit(&lineage, 5, "item group missing"),
        unit(&lineage, 6),
    ]);
    let service = service(&store, broken);
    let sink = RecordingSink::new();

    let err = service.install_mandatory(&sink).await.unwrap_err();

    assert_eq!(err.failed_version(), Some(Version(5)));
    assert_eq!(err.installed_up_to(), Some(Version(4)));
    assert!(!err.is_fatal());
    assert_eq!(
        failure_summary(&err),
        "installed up to version v4, failed at version v5: item group missing"
    );
    assert_eq!(sink.events().last(), Some(&UpdateProgress::Finished));

    let state = store.state();
    assert_eq!(state.installed_versions(), versions(&[1, 2, 3, 4]));
    assert_eq!(state.ceiling.unwrap().current_installed_version, Some(Version(4)));
    let config = state.configuration.unwrap();
    assert_eq!(config.applied, vec![4]);
    assert!(config.item_groups.is_empty());

    // Unit 5 fixed and redeployed
    let fixed = self::service(&store, registry(units(&lineage, &[4, 5, 6])));
    let plan = fixed.plan(PlanMode::Mandatory).await.unwrap();
    assert_eq!(plan.versions(), versions(&[5, 6]));

    let report = fixed.install(plan.units(), &NullSink).await.unwrap();
    assert_eq!(report.installed, versions(&[5, 6]));
    assert_eq!(store.state().configuration.unwrap().applied, vec![4, 5, 6]);
}

#[tokio::test]
async fn test_failed_batch_publishes_no_event() {
    let lineage = season6();
    let store = legacy_store(SEASON6_DESCRIPTOR);
    let service = service(
        &store,
        registry(vec![unit(&lineage, 1), failing_unit(&lineage, 2, "boom")]),
    );
    let mut events = service.events().subscribe();

    assert!(service.install_mandatory(&NullSink).await.is_err());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_lineage_resolution_is_deterministic() {
    let store = legacy_store(LegacyDescriptor::new(0, 75));
    let service = service(&store, registry(Vec::new()));

    for _ in 0..3 {
        assert_eq!(service.resolve_lineage().await.unwrap().as_str(), "Version075");
    }

    let unknown = legacy_store(LegacyDescriptor::new(9, 9));
    let service = self::service(&unknown, registry(Vec::new()));
    for _ in 0..3 {
        let err = service.resolve_lineage().await.unwrap_err();
        assert!(matches!(err, UpdateError::UnresolvableLineage { descriptor: Some(d) } if d == LegacyDescriptor::new(9, 9)));
    }
}

#[tokio::test]
async fn test_ceiling_lineage_beats_descriptor() {
    let lineage = LineageKey::new("Version095d").unwrap();
    let state = legacy_state(SEASON6_DESCRIPTOR)
        .with_ceiling(InstallationCeiling::new().raise(Version(2), lineage.clone()));
    let store = MemoryStore::new(state);
    let service = service(
        &store,
        registry(vec![unit(&season6(), 1), unit(&lineage, 3)]),
    );

    let plan = service.plan(PlanMode::Mandatory).await.unwrap();
    assert_eq!(plan.lineage(), &lineage);
    assert_eq!(plan.versions(), versions(&[3]));
}

#[tokio::test]
async fn test_pending_record_is_reinstalled() {
    let store = MemoryStore::new(
        legacy_state(SEASON6_DESCRIPTOR).with_record(pending_record(1)),
    );
    let service = service(&store, registry(units(&season6(), &[1])));

    let report = service.install_mandatory(&NullSink).await.unwrap();
    assert_eq!(report.installed, versions(&[1]));

    let status = service.status().await.unwrap();
    assert_eq!(
        status,
        LedgerStatus {
            lineage: Some(season6()),
            ceiling: Some(Version(1)),
            installed: versions(&[1]),
            pending_records: Vec::new(),
        }
    );
}

#[tokio::test]
async fn test_check_for_updates_lists_optional_after_startup() {
    let lineage = season6();
    let store = legacy_store(SEASON6_DESCRIPTOR);
    let service = service(
        &store,
        registry(vec![unit(&lineage, 1), optional_unit(&lineage, 2), unit(&lineage, 3)]),
    );

    service.install_mandatory(&NullSink).await.unwrap();

    let pending = service.check_for_updates().await.unwrap();
    let names: Vec<&str> = pending.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["optional update 2"]);

    // Operator selection through the plan
    let plan = service.plan(PlanMode::BestEffort).await.unwrap();
    let chosen = plan.select(&[Version(2)]);
    let report = service.install(chosen.units(), &NullSink).await.unwrap();
    assert_eq!(report.installed, versions(&[2]));
    assert!(service.check_for_updates().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_commit_failure_leaves_ledger_untouched() {
    let store = legacy_store(SEASON6_DESCRIPTOR);
    let service = service(&store, registry(units(&season6(), &[1, 2])));
    store.fail_next_commit();

    let err = service.install_mandatory(&NullSink).await.unwrap_err();
    assert!(matches!(err, UpdateError::CommitFailed { version: Version(1), installed_up_to: None, .. }));
    assert!(store.state().records.is_empty());

    let report = service.install_mandatory(&NullSink).await.unwrap();
    assert_eq!(report.installed, versions(&[1, 2]));
}

#[tokio::test]
async fn test_executor_and_planner_without_service() {
    let store = legacy_store(SEASON6_DESCRIPTOR);
    let units: Arc<dyn MigrationRegistry<GameConfig>> = registry(units(&season6(), &[2, 1]));
    let planner = UpdatePlanner::new(units);
    let executor = UpdateExecutor::new(Arc::new(store.clone()), UpdateEvents::new());

    let mut ctx = store.create_context().await.unwrap();
    let plan = planner.plan(ctx.as_mut(), &season6(), PlanMode::Mandatory).await.unwrap();
    drop(ctx);
    assert_eq!(plan.versions(), versions(&[1, 2]));

    let (sink, mut rx) = ChannelSink::new();
    executor.apply(plan.units(), &sink).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(progress) = rx.try_recv() {
        seen.push(progress);
    }
    assert_eq!(seen.len(), 5);
    assert_eq!(seen.last(), Some(&UpdateProgress::Finished));
}

#[tokio::test]
async fn test_json_store_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = JsonFileStore::create(&path, legacy_state(SEASON6_DESCRIPTOR))
        .await
        .unwrap();
    let service = UpdateService::new(
        Arc::new(store),
        registry(units(&season6(), &[1, 2])),
        UpdateConfig::default(),
    )
    .unwrap();

    service.install_mandatory(&NullSink).await.unwrap();

    let reopened: JsonFileStore<GameConfig> = JsonFileStore::open(&path).await.unwrap();
    let state = reopened.state();
    assert_eq!(state.installed_versions(), versions(&[1, 2]));
    assert_eq!(state.configuration.unwrap().applied, vec![1, 2]);
    assert_eq!(state.ceiling.unwrap().lineage, Some(season6()));
}

#[tokio::test]
async fn test_failed_gap_fill_names_ceiling() {
    let lineage = season6();
    let store = seeded_store(&lineage, &[1, 2, 3, 5, 7]);
    let service = service(&store, registry(vec![failing_unit(&lineage, 4, "bad drop table")]));

    let err = service.install_mandatory(&NullSink).await.unwrap_err();

    assert_eq!(err.failed_version(), Some(Version(4)));
    assert_eq!(
        failure_summary(&err),
        "ceiling v7, failed at version v4: bad drop table"
    );
}
