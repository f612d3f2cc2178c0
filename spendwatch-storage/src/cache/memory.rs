//! In-memory cache layers.

use async_trait::async_trait;
use dashmap::DashMap;
use spendwatch_core::{CacheError, ProfileKey};

use super::traits::{CacheEntry, DurableBackend, FastEntry, FastLayer};

/// Fast layer backed by a concurrent hash map.
#[derive(Debug, Default)]
pub struct MemoryLayer {
    entries: DashMap<ProfileKey, FastEntry>,
}

impl MemoryLayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FastLayer for MemoryLayer {
    fn get(&self, key: &ProfileKey) -> Option<FastEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn put(&self, entry: FastEntry) {
        self.entries.insert(entry.entry.key.clone(), entry);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Durable-layer stand-in that lives only as long as the process.
///
/// Used when no LMDB path is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryDurableBackend {
    entries: DashMap<ProfileKey, CacheEntry>,
}

impl MemoryDurableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DurableBackend for MemoryDurableBackend {
    async fn get(&self, key: &ProfileKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<CacheEntry>, CacheError> {
        Ok(self.entries.iter().map(|e| e.value().clone()).collect())
    }
}
