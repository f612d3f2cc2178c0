//! SPENDWATCH Storage - Profile Cache
//!
//! Two-tier cache for aggregated profiles: an in-process fast layer in front
//! of a durable layer, each with its own TTL. The durable layer is a trait so
//! the engine can run against LMDB in production and memory in tests.

pub mod cache;

pub use cache::{
    decode_key, encode_key, CacheEntry, CacheLayer, CacheRead, CacheStats, DurableBackend,
    FastEntry, FastLayer, LmdbDurableBackend, MemoryDurableBackend, MemoryLayer, TieredCache,
};
