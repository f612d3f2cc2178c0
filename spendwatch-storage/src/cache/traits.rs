//! Cache layer traits and entry types.

use async_trait::async_trait;
use spendwatch_core::{CacheError, Profile, ProfileKey, Timestamp};

/// A cached profile and the time it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: ProfileKey,
    pub profile: Profile,
    pub written_at: Timestamp,
}

impl CacheEntry {
    pub fn new(key: ProfileKey, profile: Profile, written_at: Timestamp) -> Self {
        Self {
            key,
            profile,
            written_at,
        }
    }
}

/// A cache entry held in the fast layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FastEntry {
    pub entry: CacheEntry,
    /// When the entry entered the fast layer (write or promotion).
    pub stored_at: Timestamp,
}

/// In-process cache layer.
///
/// Synchronous and infallible; implementations must be safe to share across
/// tasks.
pub trait FastLayer: Send + Sync {
    fn get(&self, key: &ProfileKey) -> Option<FastEntry>;

    fn put(&self, entry: FastEntry);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Durable cache layer.
///
/// Every failure is a [`CacheError`]; callers log it and carry on as if the
/// entry were missing.
#[async_trait]
pub trait DurableBackend: Send + Sync {
    /// Get the entry for a key, regardless of age.
    async fn get(&self, key: &ProfileKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or replace the entry for `entry.key`.
    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Every stored entry, regardless of age.
    async fn get_all(&self) -> Result<Vec<CacheEntry>, CacheError>;
}

/// Counters for tiered cache reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub fast_hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    /// Durable hits copied into the fast layer.
    pub promotions: u64,
    /// Durable reads or writes that failed.
    pub durable_errors: u64,
}

impl CacheStats {
    /// Fraction of reads served by either layer (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.fast_hits + self.durable_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
