//! Two-tier cache in front of a durable backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use spendwatch_core::{CacheConfig, Profile, ProfileKey, Timestamp};

use super::freshness::{is_within_ttl, CacheRead};
use super::traits::{CacheEntry, CacheStats, DurableBackend, FastEntry, FastLayer};

#[derive(Debug, Default)]
struct StatsInner {
    fast_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
    promotions: AtomicU64,
    durable_errors: AtomicU64,
}

impl StatsInner {
    fn snapshot(&self) -> CacheStats {
        CacheStats {
            fast_hits: self.fast_hits.load(Ordering::Relaxed),
            durable_hits: self.durable_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            durable_errors: self.durable_errors.load(Ordering::Relaxed),
        }
    }
}

/// Fast layer plus durable layer, each with its own TTL.
///
/// Constructed once with injected layers and cloned cheaply; clones share
/// the layers and the counters.
pub struct TieredCache<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    fast: Arc<F>,
    durable: Arc<D>,
    config: CacheConfig,
    stats: Arc<StatsInner>,
}

impl<F, D> Clone for TieredCache<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    fn clone(&self) -> Self {
        Self {
            fast: Arc::clone(&self.fast),
            durable: Arc::clone(&self.durable),
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<F, D> TieredCache<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    pub fn new(fast: Arc<F>, durable: Arc<D>, config: CacheConfig) -> Self {
        Self {
            fast,
            durable,
            config,
            stats: Arc::new(StatsInner::default()),
        }
    }

    /// Create a tiered cache with default TTLs.
    pub fn with_defaults(fast: Arc<F>, durable: Arc<D>) -> Self {
        Self::new(fast, durable, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn fast_layer(&self) -> &F {
        &self.fast
    }

    pub fn durable_backend(&self) -> &D {
        &self.durable
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Look a profile up, fast layer first.
    ///
    /// A valid durable hit is promoted into the fast layer. Durable errors
    /// are logged and reported as a miss.
    pub async fn get(&self, key: &ProfileKey) -> Option<CacheRead<Profile>> {
        self.get_at(key, Utc::now()).await
    }

    /// [`TieredCache::get`] evaluated at an explicit `now`.
    pub async fn get_at(&self, key: &ProfileKey, now: Timestamp) -> Option<CacheRead<Profile>> {
        if let Some(hit) = self.fast.get(key) {
            if self.fast_entry_valid(&hit, now) {
                self.stats.fast_hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, "fast cache hit");
                return Some(CacheRead::from_fast(hit.entry.profile, hit.entry.written_at));
            }
        }

        let entry = match self.durable.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                self.stats.durable_errors.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, error = %e, "durable cache read failed");
                return None;
            }
        };

        if !is_within_ttl(entry.written_at, now, self.config.durable_ttl) {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key = %key, written_at = %entry.written_at, "durable entry expired");
            return None;
        }

        self.stats.durable_hits.fetch_add(1, Ordering::Relaxed);
        self.stats.promotions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "promoting durable hit into fast layer");

        let written_at = entry.written_at;
        let profile = entry.profile.clone();
        self.fast.put(FastEntry {
            entry,
            stored_at: now,
        });
        Some(CacheRead::from_durable(profile, written_at))
    }

    /// Write a profile through both layers.
    ///
    /// The fast layer is written first and cannot fail. A durable failure is
    /// logged and swallowed; the fast layer still holds the new value.
    pub async fn put(&self, key: &ProfileKey, profile: Profile) {
        self.put_at(key, profile, Utc::now()).await
    }

    /// [`TieredCache::put`] stamped with an explicit `now`.
    pub async fn put_at(&self, key: &ProfileKey, profile: Profile, now: Timestamp) {
        // The durable encoding keeps millisecond precision; match it here so
        // both layers report the same written_at.
        let written_at = now.trunc_subsecs(3);
        let entry = CacheEntry::new(key.clone(), profile, written_at);

        self.fast.put(FastEntry {
            entry: entry.clone(),
            stored_at: written_at,
        });

        if let Err(e) = self.durable.put(&entry).await {
            self.stats.durable_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(key = %key, error = %e, "durable cache write failed");
        }
    }

    /// All durable entries still within the durable TTL, ordered by key.
    ///
    /// A durable failure yields an empty list.
    pub async fn get_all_valid(&self) -> Vec<Profile> {
        self.get_all_valid_at(Utc::now()).await
    }

    pub async fn get_all_valid_at(&self, now: Timestamp) -> Vec<Profile> {
        let entries = match self.durable.get_all().await {
            Ok(entries) => entries,
            Err(e) => {
                self.stats.durable_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "durable cache scan failed");
                return Vec::new();
            }
        };

        let mut valid: Vec<CacheEntry> = entries
            .into_iter()
            .filter(|e| is_within_ttl(e.written_at, now, self.config.durable_ttl))
            .collect();
        valid.sort_by(|a, b| a.key.cmp(&b.key));
        valid.into_iter().map(|e| e.profile).collect()
    }

    fn fast_entry_valid(&self, hit: &FastEntry, now: Timestamp) -> bool {
        is_within_ttl(hit.stored_at, now, self.config.fast_ttl)
            && is_within_ttl(hit.entry.written_at, now, self.config.durable_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::{MemoryDurableBackend, MemoryLayer};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use spendwatch_core::{CacheError, JurisdictionTier, TrackedIdentity};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Memory backend that counts reads and can be told to fail.
    #[derive(Default)]
    struct ProbeBackend {
        inner: MemoryDurableBackend,
        reads: AtomicU64,
        fail: AtomicBool,
    }

    impl ProbeBackend {
        fn reads(&self) -> u64 {
            self.reads.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<(), CacheError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(CacheError::Backend {
                    reason: "injected".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DurableBackend for ProbeBackend {
        async fn get(&self, key: &ProfileKey) -> Result<Option<CacheEntry>, CacheError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.get(key).await
        }

        async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
            self.check()?;
            self.inner.put(entry).await
        }

        async fn get_all(&self) -> Result<Vec<CacheEntry>, CacheError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.get_all().await
        }
    }

    fn config() -> CacheConfig {
        CacheConfig::default()
            .with_fast_ttl(Duration::from_secs(300))
            .with_durable_ttl(Duration::from_secs(86_400))
    }

    fn cache() -> (TieredCache<MemoryLayer, ProbeBackend>, Arc<ProbeBackend>) {
        let durable = Arc::new(ProbeBackend::default());
        let cache = TieredCache::new(Arc::new(MemoryLayer::new()), Arc::clone(&durable), config());
        (cache, durable)
    }

    fn profile(id: &str) -> Profile {
        Profile::new(
            TrackedIdentity::new(id, "Official", JurisdictionTier::FederalDeputy),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_put_then_get_hits_fast_layer() {
        let (cache, durable) = cache();
        let p = profile("1");
        cache.put(&p.key(), p.clone()).await;

        let read = cache.get(&p.key()).await.expect("should hit");
        assert!(read.was_fast_hit());
        assert_eq!(read.into_value(), p);
        assert_eq!(durable.reads(), 0);
        assert_eq!(cache.stats().fast_hits, 1);
    }

    #[tokio::test]
    async fn test_durable_only_entry_is_promoted() {
        let (cache, durable) = cache();
        let p = profile("2");
        let now = Utc::now();
        durable
            .inner
            .put(&CacheEntry::new(p.key(), p.clone(), now - ChronoDuration::hours(1)))
            .await
            .unwrap();

        let first = cache.get_at(&p.key(), now).await.expect("durable hit");
        assert_eq!(first.layer(), crate::cache::CacheLayer::Durable);
        assert_eq!(durable.reads(), 1);

        let second = cache
            .get_at(&p.key(), now + ChronoDuration::seconds(1))
            .await
            .expect("fast hit");
        assert!(second.was_fast_hit());
        assert_eq!(second.written_at(), first.written_at());
        assert_eq!(durable.reads(), 1);

        let stats = cache.stats();
        assert_eq!(stats.promotions, 1);
        assert_eq!(stats.durable_hits, 1);
        assert_eq!(stats.fast_hits, 1);
    }

    #[tokio::test]
    async fn test_fast_entry_expires_after_fast_ttl() {
        let (cache, durable) = cache();
        let p = profile("3");
        let now = Utc::now();
        cache.put_at(&p.key(), p.clone(), now).await;

        let later = now + ChronoDuration::seconds(301);
        let read = cache.get_at(&p.key(), later).await.expect("durable still valid");
        assert_eq!(read.layer(), crate::cache::CacheLayer::Durable);
        assert_eq!(durable.reads(), 1);
    }

    #[tokio::test]
    async fn test_promoted_entry_does_not_outlive_durable_ttl() {
        let (cache, _durable) = cache();
        let p = profile("4");
        let now = Utc::now();
        let written_at = now - ChronoDuration::seconds(86_400 - 10);
        cache
            .durable_backend()
            .inner
            .put(&CacheEntry::new(p.key(), p.clone(), written_at))
            .await
            .unwrap();

        assert!(cache.get_at(&p.key(), now).await.is_some());
        // Promoted 10s before durable expiry; fast_ttl alone would allow 300s more.
        assert!(cache
            .get_at(&p.key(), now + ChronoDuration::seconds(11))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_expired_durable_entry_is_miss() {
        let (cache, _durable) = cache();
        let p = profile("5");
        let now = Utc::now();
        cache
            .durable_backend()
            .inner
            .put(&CacheEntry::new(p.key(), p.clone(), now - ChronoDuration::hours(25)))
            .await
            .unwrap();

        assert!(cache.get_at(&p.key(), now).await.is_none());
        assert_eq!(cache.stats().misses, 1);
        assert!(cache.fast_layer().is_empty());
    }

    #[tokio::test]
    async fn test_durable_failures_are_swallowed() {
        let (cache, durable) = cache();
        durable.fail.store(true, Ordering::SeqCst);
        let p = profile("6");

        cache.put(&p.key(), p.clone()).await;
        // Fast layer was written before the durable failure.
        assert!(cache.get(&p.key()).await.is_some());

        let other = ProfileKey::new(JurisdictionTier::FederalDeputy, "missing");
        assert!(cache.get(&other).await.is_none());
        assert!(cache.get_all_valid().await.is_empty());
        assert_eq!(cache.stats().durable_errors, 3);
    }

    #[tokio::test]
    async fn test_get_all_valid_filters_expired_and_sorts() {
        let (cache, _durable) = cache();
        let now = Utc::now();
        cache.put_at(&profile("b").key(), profile("b"), now).await;
        cache.put_at(&profile("a").key(), profile("a"), now).await;
        cache
            .put_at(&profile("old").key(), profile("old"), now - ChronoDuration::days(2))
            .await;

        let valid = cache.get_all_valid_at(now).await;
        let ids: Vec<&str> = valid.iter().map(|p| p.identity.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_clones_share_layers_and_stats() {
        let (cache, _durable) = cache();
        let clone = cache.clone();
        let p = profile("7");
        cache.put(&p.key(), p.clone()).await;
        assert!(clone.get(&p.key()).await.is_some());
        assert_eq!(cache.stats().fast_hits, 1);
    }
}
