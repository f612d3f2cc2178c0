//! AuditService wiring from configuration.

use std::sync::Arc;
use std::time::Duration;

use spendwatch_core::{JurisdictionTier, SourceKind, SpendCategory, SpendwatchConfig, SpendwatchError};
use spendwatch_engine::{AuditService, Phase, RefreshOutcome};
use spendwatch_sources::{AdapterRegistry, SourceProbe};
use spendwatch_storage::{LmdbDurableBackend, MemoryDurableBackend};
use spendwatch_test_utils::fixtures::{deputies, expense_records, make_expense, make_identity};
use spendwatch_test_utils::{ProbeBehavior, ScriptedAdapter, StaticProbe};
use tempfile::TempDir;

async fn registry_with(adapter: Arc<ScriptedAdapter>) -> Arc<AdapterRegistry> {
    let registry = Arc::new(AdapterRegistry::new());
    registry
        .register(JurisdictionTier::FederalDeputy, adapter)
        .await
        .unwrap();
    registry
}

fn probes() -> Vec<Arc<dyn SourceProbe>> {
    vec![
        Arc::new(StaticProbe::new(SourceKind::Chamber, ProbeBehavior::Reachable)) as Arc<dyn SourceProbe>,
        Arc::new(StaticProbe::new(SourceKind::Senate, ProbeBehavior::Failing)) as Arc<dyn SourceProbe>,
    ]
}

#[tokio::test]
async fn test_service_end_to_end_over_lmdb() {
    let dir = TempDir::new().unwrap();
    let mut config = SpendwatchConfig::default();
    config.cache.lmdb_path = dir.path().join("cache");
    config.refresh.interval = Duration::from_millis(20);

    let adapter = Arc::new(ScriptedAdapter::spending(expense_records(&[
        make_expense(SpendCategory::Fuel, 600.0, 1),
        make_expense(SpendCategory::Office, 1_400.0, 2),
    ])));
    let durable = Arc::new(LmdbDurableBackend::from_config(&config.cache).unwrap());
    let service = AuditService::from_config(
        &config,
        durable,
        registry_with(adapter.clone()).await,
        probes(),
        deputies(3),
    )
    .unwrap();

    let outcome = service.refresh().await;
    assert!(matches!(outcome, RefreshOutcome::Applied(ref s) if s.refreshed == 3));
    let state = service.snapshot();
    assert_eq!(state.phase, Phase::Ready);
    assert_eq!(state.profiles.len(), 3);
    assert_eq!(adapter.calls(), 3);

    let identity = make_identity(JurisdictionTier::FederalDeputy, "2");
    let cached = service.fetch_one(&identity, false).await.unwrap();
    assert_eq!(cached.total_spend(), 2_000.0);
    assert_eq!(adapter.calls(), 3);

    service.fetch_one(&identity, true).await.unwrap();
    assert_eq!(adapter.calls(), 4);

    let batch = service.fetch_all(&deputies(3), false).await;
    assert!(batch.is_complete());
    assert_eq!(adapter.calls(), 4);

    let health = service.get_health().await;
    assert_eq!(health.unreachable_sources(), vec![SourceKind::Senate]);
    assert_eq!(service.latest_health().await, health);

    let handle = service.start_auto_refresh(service.refresh_interval(), |_| {});
    assert!(adapter.wait_for_calls(7).await);
    service.teardown();
    assert!(handle.is_stopped());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = SpendwatchConfig::default();
    config.aggregation.max_concurrent_fetches = 0;

    let adapter = Arc::new(ScriptedAdapter::spending(Vec::new()));
    let result = AuditService::from_config(
        &config,
        Arc::new(MemoryDurableBackend::new()),
        registry_with(adapter).await,
        Vec::new(),
        Vec::new(),
    );
    assert!(matches!(result, Err(SpendwatchError::Config(_))));
}

#[tokio::test]
async fn test_auto_refresh_uses_caller_period() {
    let mut config = SpendwatchConfig::default();
    config.refresh.interval = Duration::from_secs(3_600);

    let adapter = Arc::new(ScriptedAdapter::spending(expense_records(&[make_expense(
        SpendCategory::Meals,
        80.0,
        3,
    )])));
    let service = AuditService::from_config(
        &config,
        Arc::new(MemoryDurableBackend::new()),
        registry_with(adapter.clone()).await,
        Vec::new(),
        deputies(1),
    )
    .unwrap();
    assert_eq!(service.refresh_interval(), Duration::from_secs(3_600));

    let handle = service.start_auto_refresh(Duration::from_millis(15), |_| {});
    assert!(adapter.wait_for_calls(3).await);
    handle.join().await;
}
