//! Refresh Scheduler
//!
//! Per-consumer refresh state machine:
//!
//! ```text
//! Idle ──▶ Loading ──▶ Ready ──▶ Refreshing ──▶ Ready
//! ```
//!
//! - At most one refresh runs per scheduler; a second call while one is in
//!   flight returns [`RefreshOutcome::AlreadyInFlight`] without fanning out.
//! - The first refresh paints valid cached profiles before any network
//!   round-trip, then fetches preferring the cache. Later refreshes force.
//! - A failed refresh keeps the last good profiles and attaches a
//!   [`ConsumerError`] (stale-while-revalidate).
//! - Every commit point checks the liveness token. After [`RefreshScheduler::teardown`]
//!   nothing observable changes and state listeners are never invoked.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use spendwatch_core::{new_refresh_id, Profile, ProfileKey, RefreshId, Timestamp, TrackedIdentity};
use spendwatch_storage::{DurableBackend, FastLayer};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{BatchFetch, FetchMode, Orchestrator};
use crate::task::{ScheduledTask, StopHandle};
use crate::watcher::{AvailabilityTracker, DatasetAvailability, Transition};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Ready,
    Refreshing,
}

/// Error attached to consumer state after a refresh with failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumerError {
    /// Nothing could be produced and nothing was cached.
    #[error("no profile could be loaded ({} failed)", .failed.len())]
    Blocking { failed: Vec<ProfileKey> },

    /// Some profiles failed; last known data is still shown.
    #[error("{} profile(s) could not be refreshed; showing last known data", .failed.len())]
    Advisory { failed: Vec<ProfileKey> },
}

impl ConsumerError {
    pub fn is_blocking(&self) -> bool {
        matches!(self, ConsumerError::Blocking { .. })
    }

    pub fn failed(&self) -> &[ProfileKey] {
        match self {
            ConsumerError::Blocking { failed } | ConsumerError::Advisory { failed } => failed,
        }
    }
}

/// Everything a consumer renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerState {
    pub phase: Phase,
    pub profiles: BTreeMap<ProfileKey, Profile>,
    pub error: Option<ConsumerError>,
    pub last_refreshed: Option<Timestamp>,
}

impl ConsumerState {
    pub fn profile(&self, key: &ProfileKey) -> Option<&Profile> {
        self.profiles.get(key)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading | Phase::Refreshing)
    }
}

/// What a completed refresh changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshSummary {
    pub refresh_id: RefreshId,
    pub refreshed: usize,
    pub failed: Vec<ProfileKey>,
    pub completed_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The refresh ran and its result was committed.
    Applied(RefreshSummary),
    /// Another refresh was running; nothing was started.
    AlreadyInFlight,
    /// The consumer went away while the refresh was running.
    Discarded,
    /// The consumer had already been torn down.
    Inactive,
}

/// Called with the new state after every committed change.
pub type StateListener = Arc<dyn Fn(&ConsumerState) + Send + Sync>;

// ============================================================================
// SCHEDULER
// ============================================================================

struct Inner<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    orchestrator: Orchestrator<F, D>,
    identities: RwLock<Vec<TrackedIdentity>>,
    state: watch::Sender<ConsumerState>,
    listeners: Mutex<Vec<StateListener>>,
    in_flight: AtomicBool,
    liveness: CancellationToken,
}

pub struct RefreshScheduler<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    inner: Arc<Inner<F, D>>,
}

impl<F, D> Clone for RefreshScheduler<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<F, D> RefreshScheduler<F, D>
where
    F: FastLayer + 'static,
    D: DurableBackend + 'static,
{
    pub fn new(orchestrator: Orchestrator<F, D>, identities: Vec<TrackedIdentity>) -> Self {
        let (state, _) = watch::channel(ConsumerState::default());
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                identities: RwLock::new(identities),
                state,
                listeners: Mutex::new(Vec::new()),
                in_flight: AtomicBool::new(false),
                liveness: CancellationToken::new(),
            }),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator<F, D> {
        &self.inner.orchestrator
    }

    /// Register a listener for committed state changes.
    pub fn on_state_change(&self, listener: StateListener) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Watch channel carrying every committed state.
    pub fn subscribe(&self) -> watch::Receiver<ConsumerState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> ConsumerState {
        self.inner.state.borrow().clone()
    }

    /// Replace the tracked identities; takes effect on the next refresh.
    pub async fn track(&self, identities: Vec<TrackedIdentity>) {
        *self.inner.identities.write().await = identities;
    }

    pub async fn identities(&self) -> Vec<TrackedIdentity> {
        self.inner.identities.read().await.clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn is_live(&self) -> bool {
        !self.inner.liveness.is_cancelled()
    }

    /// Token cancelled on teardown; parent of every scheduled task.
    pub fn liveness(&self) -> &CancellationToken {
        &self.inner.liveness
    }

    /// Refresh all tracked profiles unless a refresh is already running.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.run_refresh(None).await
    }

    /// Refresh bypassing the cache, even on the first load.
    pub async fn force_refresh(&self) -> RefreshOutcome {
        self.run_refresh(Some(FetchMode::ForceRefresh)).await
    }

    /// Refresh every `period` until stopped or torn down.
    ///
    /// Ticks that find a refresh in flight are skipped. `callback` runs after
    /// each applied refresh, never after teardown.
    pub fn start_auto_refresh<C>(&self, period: Duration, callback: C) -> StopHandle
    where
        C: Fn(&RefreshSummary) + Send + Sync + 'static,
    {
        let scheduler = self.clone();
        let callback = Arc::new(callback);

        ScheduledTask::spawn("auto-refresh", period, &self.inner.liveness, move || {
            let scheduler = scheduler.clone();
            let callback = Arc::clone(&callback);
            async move {
                if scheduler.is_in_flight() {
                    tracing::trace!("refresh in flight; skipping tick");
                    return;
                }
                if let RefreshOutcome::Applied(summary) = scheduler.refresh().await {
                    callback(&summary);
                }
            }
        })
    }

    /// Poll `availability` every `period`; force one refresh on each
    /// unavailable-to-available transition.
    ///
    /// If another refresh is running when the transition is seen, the forced
    /// refresh is retried on later polls until it gets to run.
    pub fn watch_dataset(
        &self,
        availability: Arc<dyn DatasetAvailability>,
        period: Duration,
    ) -> StopHandle {
        let scheduler = self.clone();
        let tracker = Arc::new(AvailabilityTracker::new());

        ScheduledTask::spawn("dataset-watch", period, &self.inner.liveness, move || {
            let scheduler = scheduler.clone();
            let availability = Arc::clone(&availability);
            let tracker = Arc::clone(&tracker);
            async move {
                match availability.is_available().await {
                    Ok(available) => {
                        if tracker.observe(available) == Transition::BecameAvailable {
                            tracing::info!("dataset became available; forcing refresh");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dataset availability poll failed");
                    }
                }

                // A refresh already in flight started before publication, so
                // the transition keeps waiting for one of its own.
                if tracker.refresh_pending() {
                    match scheduler.force_refresh().await {
                        RefreshOutcome::AlreadyInFlight => {
                            tracing::debug!("refresh in flight; dataset refresh deferred to next poll");
                        }
                        outcome => {
                            tracker.refresh_started();
                            tracing::debug!(outcome = ?outcome, "dataset refresh finished");
                        }
                    }
                }
            }
        })
    }

    /// Mark the consumer gone. Pending refreshes complete but never commit,
    /// and every scheduled task stops.
    pub fn teardown(&self) {
        if !self.inner.liveness.is_cancelled() {
            self.inner.liveness.cancel();
            tracing::info!("consumer torn down");
        }
    }

    async fn run_refresh(&self, requested: Option<FetchMode>) -> RefreshOutcome {
        let inner = &self.inner;
        if inner.liveness.is_cancelled() {
            return RefreshOutcome::Inactive;
        }
        if inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("refresh already in flight");
            return RefreshOutcome::AlreadyInFlight;
        }
        let _guard = InFlightGuard(&inner.in_flight);

        let refresh_id = new_refresh_id();
        let initial = inner.state.borrow().phase == Phase::Idle;
        let mode = requested.unwrap_or(if initial {
            FetchMode::PreferCache
        } else {
            FetchMode::ForceRefresh
        });
        let identities = inner.identities.read().await.clone();
        let tracked: HashSet<ProfileKey> = identities.iter().map(TrackedIdentity::key).collect();

        let phase = if initial { Phase::Loading } else { Phase::Refreshing };
        if !self.commit(|state| state.phase = phase) {
            return RefreshOutcome::Discarded;
        }

        if initial {
            let cached = inner.orchestrator.cache().get_all_valid().await;
            let painted = self.commit(|state| {
                for profile in cached {
                    let key = profile.key();
                    if tracked.contains(&key) {
                        state.profiles.insert(key, profile);
                    }
                }
            });
            if !painted {
                return RefreshOutcome::Discarded;
            }
        }

        let batch = inner.orchestrator.fetch_all(&identities, mode).await;

        if inner.liveness.is_cancelled() {
            tracing::debug!(refresh_id = %refresh_id, "discarding refresh result after teardown");
            return RefreshOutcome::Discarded;
        }

        let completed_at = Utc::now();
        let summary = RefreshSummary {
            refresh_id,
            refreshed: batch.profiles.len(),
            failed: batch.failed.clone(),
            completed_at,
        };

        if !self.commit(|state| apply_batch(state, batch, &tracked, completed_at)) {
            return RefreshOutcome::Discarded;
        }

        tracing::info!(
            refresh_id = %refresh_id,
            refreshed = summary.refreshed,
            failed = summary.failed.len(),
            mode = ?mode,
            "refresh applied"
        );
        RefreshOutcome::Applied(summary)
    }

    /// Apply `update` and notify listeners, unless the consumer is gone.
    fn commit(&self, update: impl FnOnce(&mut ConsumerState)) -> bool {
        if self.inner.liveness.is_cancelled() {
            return false;
        }
        self.inner.state.send_modify(update);

        let snapshot = self.snapshot();
        let listeners: Vec<StateListener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(&snapshot);
        }
        true
    }
}

/// Fold a batch result into consumer state.
///
/// Produced profiles replace their key; failed keys keep whatever was there.
pub fn apply_batch(
    state: &mut ConsumerState,
    batch: BatchFetch,
    tracked: &HashSet<ProfileKey>,
    now: Timestamp,
) {
    let produced = batch.profiles.len();
    for profile in batch.profiles {
        state.profiles.insert(profile.key(), profile);
    }
    state.profiles.retain(|key, _| tracked.contains(key));

    state.error = if batch.failed.is_empty() {
        None
    } else if produced == 0 && state.profiles.is_empty() {
        Some(ConsumerError::Blocking {
            failed: batch.failed,
        })
    } else {
        Some(ConsumerError::Advisory {
            failed: batch.failed,
        })
    };
    state.phase = Phase::Ready;
    state.last_refreshed = Some(now);
}

impl<F, D> std::fmt::Debug for RefreshScheduler<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("in_flight", &self.inner.in_flight.load(Ordering::Relaxed))
            .field("live", &!self.inner.liveness.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use spendwatch_core::JurisdictionTier;

    fn profile(id: &str) -> Profile {
        let identity = TrackedIdentity::new(id, "Name", JurisdictionTier::StateDeputy);
        Profile::new(identity, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
    }

    fn tracked(ids: &[&str]) -> HashSet<ProfileKey> {
        ids.iter()
            .map(|id| ProfileKey::new(JurisdictionTier::StateDeputy, *id))
            .collect()
    }

    #[test]
    fn test_apply_batch_keeps_failed_profiles() {
        let mut state = ConsumerState::default();
        state.profiles.insert(profile("1").key(), profile("1"));
        state.profiles.insert(profile("2").key(), profile("2"));

        let mut refreshed = profile("1");
        refreshed.spend_ceiling = 10.0;
        let batch = BatchFetch {
            profiles: vec![refreshed],
            failed: vec![profile("2").key()],
        };
        apply_batch(&mut state, batch, &tracked(&["1", "2"]), Utc::now());

        assert_eq!(state.phase, Phase::Ready);
        assert_eq!(state.profiles.len(), 2);
        assert_eq!(state.profile(&profile("1").key()).unwrap().spend_ceiling, 10.0);
        let error = state.error.unwrap();
        assert!(!error.is_blocking());
        assert_eq!(error.failed(), &[profile("2").key()]);
    }

    #[test]
    fn test_apply_batch_blocking_only_when_nothing_available() {
        let mut state = ConsumerState::default();
        let batch = BatchFetch {
            profiles: vec![],
            failed: vec![profile("1").key()],
        };
        apply_batch(&mut state, batch, &tracked(&["1"]), Utc::now());
        assert!(state.error.unwrap().is_blocking());
    }

    #[test]
    fn test_apply_batch_drops_untracked_and_clears_error() {
        let mut state = ConsumerState {
            error: Some(ConsumerError::Advisory { failed: vec![] }),
            ..ConsumerState::default()
        };
        state.profiles.insert(profile("old").key(), profile("old"));

        let batch = BatchFetch {
            profiles: vec![profile("1")],
            failed: vec![],
        };
        apply_batch(&mut state, batch, &tracked(&["1"]), Utc::now());
        assert!(state.error.is_none());
        assert_eq!(state.profiles.len(), 1);
    }

    #[test]
    fn test_summary_serializes_failed_keys() {
        let summary = RefreshSummary {
            refresh_id: new_refresh_id(),
            refreshed: 1,
            failed: vec![profile("2").key()],
            completed_at: Utc::now(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["refreshed"], 1);
        assert_eq!(json["failed"].as_array().unwrap().len(), 1);
        assert_eq!(serde_json::to_value(Phase::Refreshing).unwrap(), "refreshing");
    }
}
