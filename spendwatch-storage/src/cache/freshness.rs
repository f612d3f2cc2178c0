//! Freshness metadata for cache reads.

use chrono::Utc;
use spendwatch_core::Timestamp;
use std::time::Duration;

/// Which layer served a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLayer {
    Fast,
    Durable,
}

/// `true` while `now - at < ttl`.
///
/// A timestamp in the future (clock skew) counts as age zero.
pub fn is_within_ttl(at: Timestamp, now: Timestamp, ttl: Duration) -> bool {
    let age = (now - at).to_std().unwrap_or(Duration::ZERO);
    age < ttl
}

/// Result of a cache read, carrying the serving layer and the write time.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    written_at: Timestamp,
    layer: CacheLayer,
}

impl<T> CacheRead<T> {
    pub fn from_fast(value: T, written_at: Timestamp) -> Self {
        Self {
            value,
            written_at,
            layer: CacheLayer::Fast,
        }
    }

    pub fn from_durable(value: T, written_at: Timestamp) -> Self {
        Self {
            value,
            written_at,
            layer: CacheLayer::Durable,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// When the cached value was originally produced.
    pub fn written_at(&self) -> Timestamp {
        self.written_at
    }

    pub fn layer(&self) -> CacheLayer {
        self.layer
    }

    pub fn was_fast_hit(&self) -> bool {
        self.layer == CacheLayer::Fast
    }

    /// Age of the value as of now.
    pub fn staleness(&self) -> Duration {
        (Utc::now() - self.written_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            written_at: self.written_at,
            layer: self.layer,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
