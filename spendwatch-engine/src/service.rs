//! Audit Service
//!
//! Consumer-facing entry point. Wires the tiered cache, adapter registry,
//! orchestrator, refresh scheduler and health monitor together and exposes
//! the operations a dashboard needs.

use std::sync::Arc;
use std::time::Duration;

use spendwatch_core::{
    HealthVector, Profile, RefreshConfig, SpendwatchConfig, SpendwatchResult, TrackedIdentity,
};
use spendwatch_sources::{AdapterRegistry, DatasetAvailability, SourceProbe};
use spendwatch_storage::{DurableBackend, FastLayer, MemoryLayer, TieredCache};
use tokio::sync::watch;

use crate::health::HealthMonitor;
use crate::orchestrator::{BatchFetch, FetchMode, Orchestrator};
use crate::scheduler::{ConsumerState, RefreshOutcome, RefreshScheduler, RefreshSummary, StateListener};
use crate::task::StopHandle;

pub struct AuditService<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    scheduler: RefreshScheduler<F, D>,
    health: Arc<HealthMonitor>,
    refresh: RefreshConfig,
}

impl<D> AuditService<MemoryLayer, D>
where
    D: DurableBackend + 'static,
{
    /// Build a service with an in-process fast layer in front of `durable`.
    pub fn from_config(
        config: &SpendwatchConfig,
        durable: Arc<D>,
        registry: Arc<AdapterRegistry>,
        probes: Vec<Arc<dyn SourceProbe>>,
        identities: Vec<TrackedIdentity>,
    ) -> SpendwatchResult<Self> {
        config.validate()?;

        let cache = TieredCache::new(Arc::new(MemoryLayer::new()), durable, config.cache.clone());
        let orchestrator = Orchestrator::new(cache, registry)
            .with_policy(config.red_flags.clone())
            .with_aggregation(config.aggregation.clone());
        let health = HealthMonitor::new(probes, &config.health)?;

        Ok(Self::new(
            RefreshScheduler::new(orchestrator, identities),
            health,
            config.refresh.clone(),
        ))
    }
}

impl<F, D> AuditService<F, D>
where
    F: FastLayer + 'static,
    D: DurableBackend + 'static,
{
    pub fn new(scheduler: RefreshScheduler<F, D>, health: HealthMonitor, refresh: RefreshConfig) -> Self {
        Self {
            scheduler,
            health: Arc::new(health),
            refresh,
        }
    }

    pub fn scheduler(&self) -> &RefreshScheduler<F, D> {
        &self.scheduler
    }

    pub fn orchestrator(&self) -> &Orchestrator<F, D> {
        self.scheduler.orchestrator()
    }

    /// Fetch every given identity, preferring valid cached profiles unless
    /// `force` is set.
    pub async fn fetch_all(&self, identities: &[TrackedIdentity], force: bool) -> BatchFetch {
        self.orchestrator().fetch_all(identities, mode(force)).await
    }

    pub async fn fetch_one(&self, identity: &TrackedIdentity, force: bool) -> Option<Profile> {
        self.orchestrator().fetch_entity(identity, mode(force)).await
    }

    /// Refresh the tracked identities into consumer state.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.scheduler.refresh().await
    }

    pub async fn force_refresh(&self) -> RefreshOutcome {
        self.scheduler.force_refresh().await
    }

    /// Probe every source now.
    pub async fn get_health(&self) -> HealthVector {
        self.health.probe().await
    }

    pub async fn latest_health(&self) -> HealthVector {
        self.health.latest().await
    }

    /// Configured auto-refresh period.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh.interval
    }

    /// Auto-refresh every `period`; see [`Self::refresh_interval`] for the
    /// configured default.
    pub fn start_auto_refresh<C>(&self, period: Duration, callback: C) -> StopHandle
    where
        C: Fn(&RefreshSummary) + Send + Sync + 'static,
    {
        self.scheduler.start_auto_refresh(period, callback)
    }

    /// Watch for a dataset publication on the configured poll interval.
    pub fn watch_dataset(&self, availability: Arc<dyn DatasetAvailability>) -> StopHandle {
        self.scheduler
            .watch_dataset(availability, self.refresh.dataset_poll_interval)
    }

    pub async fn track(&self, identities: Vec<TrackedIdentity>) {
        self.scheduler.track(identities).await;
    }

    pub fn on_state_change(&self, listener: StateListener) {
        self.scheduler.on_state_change(listener);
    }

    pub fn snapshot(&self) -> ConsumerState {
        self.scheduler.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConsumerState> {
        self.scheduler.subscribe()
    }

    /// Stop every timer and suppress any pending state change.
    pub fn teardown(&self) {
        self.scheduler.teardown();
    }
}

fn mode(force: bool) -> FetchMode {
    if force {
        FetchMode::ForceRefresh
    } else {
        FetchMode::PreferCache
    }
}

impl<F, D> std::fmt::Debug for AuditService<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditService")
            .field("scheduler", &self.scheduler)
            .field("health", &self.health)
            .field("refresh", &self.refresh)
            .finish()
    }
}
