//! SPENDWATCH Test Utilities
//!
//! Shared test infrastructure for the SPENDWATCH workspace:
//! - Mock source adapters with call counters and release gates
//! - A durable cache backend with read counting and failure injection
//! - Scripted reachability probes and dataset availability
//! - Fixtures and proptest generators for profile types

pub use spendwatch_core::{
    FieldGroup, JurisdictionTier, NormalizedRecord, Profile, ProfileKey, SourceError, SourceKind,
    SpendCategory, SpendRecord, StaffStats, TrackedIdentity,
};

use async_trait::async_trait;
use spendwatch_core::CacheError;
use spendwatch_sources::{DatasetAvailability, FetchParams, SourceAdapter, SourceProbe};
use spendwatch_storage::{CacheEntry, DurableBackend, MemoryDurableBackend};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{watch, Mutex};

// ============================================================================
// GATE
// ============================================================================

/// A latch that holds callers until it is opened. Opening is permanent.
#[derive(Debug)]
pub struct Gate {
    open: watch::Sender<bool>,
}

impl Gate {
    pub fn new() -> Self {
        let (open, _) = watch::channel(false);
        Self { open }
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.open.subscribe();
        // The sender lives in self, so the channel cannot close while we wait.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MOCK ADAPTERS
// ============================================================================

/// Adapter returning a scripted result and counting calls.
///
/// With a gate attached, every fetch waits for the gate after bumping the
/// call counter, so tests can hold a refresh in flight.
pub struct ScriptedAdapter {
    source: SourceKind,
    owned: Vec<FieldGroup>,
    script: Mutex<Result<Vec<NormalizedRecord>, SourceError>>,
    calls: AtomicUsize,
    gate: Option<std::sync::Arc<Gate>>,
}

impl ScriptedAdapter {
    pub fn new(source: SourceKind, owned: &[FieldGroup], records: Vec<NormalizedRecord>) -> Self {
        Self {
            source,
            owned: owned.to_vec(),
            script: Mutex::new(Ok(records)),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Chamber-style adapter owning spending and staffing.
    pub fn spending(records: Vec<NormalizedRecord>) -> Self {
        Self::new(
            SourceKind::Chamber,
            &[FieldGroup::Spending, FieldGroup::Staffing],
            records,
        )
    }

    pub fn with_gate(mut self, gate: std::sync::Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub async fn set_records(&self, records: Vec<NormalizedRecord>) {
        *self.script.lock().await = Ok(records);
    }

    /// Make subsequent fetches fail with a transport error.
    pub async fn fail_with(&self, reason: impl Into<String>) {
        *self.script.lock().await = Err(SourceError::Transport {
            feed: self.source,
            reason: reason.into(),
        });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Poll until at least `n` fetches have started, or give up after 2s.
    pub async fn wait_for_calls(&self, n: usize) -> bool {
        for _ in 0..400 {
            if self.calls() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn owned_fields(&self) -> &[FieldGroup] {
        &self.owned
    }

    async fn fetch(
        &self,
        _identity: &TrackedIdentity,
        _params: &FetchParams,
    ) -> Result<Vec<NormalizedRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        self.script.lock().await.clone()
    }
}

/// Adapter that always fails with a transport error.
pub struct FailingAdapter {
    source: SourceKind,
    owned: Vec<FieldGroup>,
    calls: AtomicUsize,
}

impl FailingAdapter {
    pub fn new(source: SourceKind, owned: &[FieldGroup]) -> Self {
        Self {
            source,
            owned: owned.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for FailingAdapter {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn owned_fields(&self) -> &[FieldGroup] {
        &self.owned
    }

    async fn fetch(
        &self,
        identity: &TrackedIdentity,
        _params: &FetchParams,
    ) -> Result<Vec<NormalizedRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SourceError::Transport {
            feed: self.source,
            reason: format!("connection refused for {}", identity.key()),
        })
    }
}

// ============================================================================
// DURABLE BACKEND
// ============================================================================

/// In-memory durable backend that counts reads and can be made to fail.
#[derive(Debug, Default)]
pub struct CountingDurableBackend {
    inner: MemoryDurableBackend,
    reads: AtomicUsize,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl CountingDurableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Seed an entry without touching the counters.
    pub async fn seed(&self, entry: CacheEntry) {
        // MemoryDurableBackend::put never fails.
        let _ = self.inner.put(&entry).await;
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Io {
                reason: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DurableBackend for CountingDurableBackend {
    async fn get(&self, key: &ProfileKey) -> Result<Option<CacheEntry>, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.put(entry).await
    }

    async fn get_all(&self) -> Result<Vec<CacheEntry>, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get_all().await
    }
}

// ============================================================================
// PROBES
// ============================================================================

/// How a [`StaticProbe`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeBehavior {
    Reachable,
    Failing,
    /// Never answers within any reasonable timeout.
    Hanging,
}

#[derive(Debug, Clone)]
pub struct StaticProbe {
    source: SourceKind,
    behavior: ProbeBehavior,
}

impl StaticProbe {
    pub fn new(source: SourceKind, behavior: ProbeBehavior) -> Self {
        Self { source, behavior }
    }
}

#[async_trait]
impl SourceProbe for StaticProbe {
    fn source(&self) -> SourceKind {
        self.source
    }

    async fn probe(&self) -> Result<(), SourceError> {
        match self.behavior {
            ProbeBehavior::Reachable => Ok(()),
            ProbeBehavior::Failing => Err(SourceError::Transport {
                feed: self.source,
                reason: "503 Service Unavailable".to_string(),
            }),
            ProbeBehavior::Hanging => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

/// Dataset availability flipped by the test.
#[derive(Debug, Default)]
pub struct ToggleAvailability {
    available: AtomicBool,
    erroring: AtomicBool,
    polls: AtomicUsize,
}

impl ToggleAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_erroring(&self, erroring: bool) {
        self.erroring.store(erroring, Ordering::SeqCst);
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_polls(&self, n: usize) -> bool {
        for _ in 0..400 {
            if self.polls() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

#[async_trait]
impl DatasetAvailability for ToggleAvailability {
    async fn is_available(&self) -> Result<bool, SourceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.erroring.load(Ordering::SeqCst) {
            return Err(SourceError::Timeout {
                feed: SourceKind::Electoral,
                after_ms: 5000,
            });
        }
        Ok(self.available.load(Ordering::SeqCst))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common scenarios.

    use super::*;
    use chrono::{NaiveDate, Utc};

    /// Identity with a predictable name, party and region.
    pub fn make_identity(tier: JurisdictionTier, id: &str) -> TrackedIdentity {
        TrackedIdentity::new(id, format!("Official {}", id), tier)
            .with_party("IND")
            .with_region("DF")
    }

    /// Chamber expense dated in March 2024.
    pub fn make_expense(category: SpendCategory, amount: f64, day: u32) -> SpendRecord {
        SpendRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, day.clamp(1, 31)).unwrap_or_default(),
            category,
            amount,
            vendor: format!("{} vendor", category),
            document_id: Some(format!("NF-{}-{}", category, day)),
            source: SourceKind::Chamber,
        }
    }

    pub fn make_profile(identity: TrackedIdentity, spending: Vec<SpendRecord>) -> Profile {
        let mut profile = Profile::new(identity, Utc::now());
        profile.spending = spending;
        profile
    }

    /// Expense records wrapped for adapter scripts.
    pub fn expense_records(expenses: &[SpendRecord]) -> Vec<NormalizedRecord> {
        expenses
            .iter()
            .cloned()
            .map(NormalizedRecord::Expense)
            .collect()
    }

    /// `n` federal deputies with ids `"1"..="n"`.
    pub fn deputies(n: usize) -> Vec<TrackedIdentity> {
        (1..=n)
            .map(|i| make_identity(JurisdictionTier::FederalDeputy, &i.to_string()))
            .collect()
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for profile types.

    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    pub fn arb_tier() -> impl Strategy<Value = JurisdictionTier> {
        prop::sample::select(JurisdictionTier::ALL.to_vec())
    }

    pub fn arb_category() -> impl Strategy<Value = SpendCategory> {
        prop_oneof![
            Just(SpendCategory::Fuel),
            Just(SpendCategory::Travel),
            Just(SpendCategory::Meals),
            Just(SpendCategory::PublicRelations),
            Just(SpendCategory::Office),
            Just(SpendCategory::Lodging),
            Just(SpendCategory::Telecom),
            Just(SpendCategory::Consulting),
            Just(SpendCategory::Other),
        ]
    }

    pub fn arb_identity() -> impl Strategy<Value = TrackedIdentity> {
        (arb_tier(), "[0-9]{1,6}", "[A-Z][a-z]{2,10}").prop_map(|(tier, id, name)| {
            TrackedIdentity::new(id, name, tier)
        })
    }

    /// Expenses in 2024 with amounts up to 20 000 in whole cents.
    pub fn arb_expense() -> impl Strategy<Value = SpendRecord> {
        (arb_category(), 0u32..2_000_000, 1u32..=366, proptest::option::of("[A-Z0-9]{4}"))
            .prop_map(|(category, cents, ordinal, document_id)| SpendRecord {
                date: NaiveDate::from_yo_opt(2024, ordinal).unwrap_or_default(),
                category,
                amount: cents as f64 / 100.0,
                vendor: format!("{} vendor", category),
                document_id,
                source: SourceKind::Chamber,
            })
    }

    pub fn arb_staff_stats() -> impl Strategy<Value = StaffStats> {
        (0u32..40, 0u32..40).prop_map(|(utilized, max)| StaffStats {
            utilized_staff: utilized,
            max_staff: max,
            staff_cost: utilized as f64 * 9_000.0,
            staff_cost_ceiling: max as f64 * 9_000.0,
            source: Some(SourceKind::Chamber),
        })
    }
}
