//! Tiered profile cache.
//!
//! Reads go fast layer first, then the durable layer. A valid durable hit is
//! promoted into the fast layer so the next read does not touch the durable
//! store. Expiry is soft: stale entries stay on disk and are filtered on read.
//!
//! # Validity
//!
//! - Fast layer: `now - stored_at < fast_ttl` and `now - written_at < durable_ttl`
//! - Durable layer: `now - written_at < durable_ttl`
//!
//! `stored_at` is when the entry entered the fast layer (write or promotion);
//! `written_at` is when the profile was produced and never changes on promotion.
//!
//! # Example
//!
//! ```ignore
//! let cache = TieredCache::new(
//!     Arc::new(MemoryLayer::new()),
//!     Arc::new(LmdbDurableBackend::new("/var/lib/spendwatch", 256)?),
//!     CacheConfig::default(),
//! );
//!
//! cache.put(&profile.key(), profile.clone()).await;
//! if let Some(read) = cache.get(&profile.key()).await {
//!     tracing::debug!(layer = ?read.layer(), "served from cache");
//! }
//! ```

pub mod freshness;
pub mod lmdb_backend;
pub mod memory;
pub mod profile_key;
pub mod tiered;
pub mod traits;

pub use freshness::{is_within_ttl, CacheLayer, CacheRead};
pub use lmdb_backend::LmdbDurableBackend;
pub use memory::{MemoryDurableBackend, MemoryLayer};
pub use profile_key::{decode_key, encode_key, tier_prefix};
pub use tiered::TieredCache;
pub use traits::{CacheEntry, CacheStats, DurableBackend, FastEntry, FastLayer};
