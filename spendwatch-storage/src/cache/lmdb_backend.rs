//! LMDB-backed durable layer.
//!
//! Uses the heed crate (Rust bindings for LMDB) for an embedded,
//! memory-mapped store that survives restarts.
//!
//! # Value Format
//!
//! `[written_at millis: 8 bytes LE][profile json]`
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. Reads use read transactions; `put` uses
//! a write transaction per entry. Cross-process locking is not attempted.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use spendwatch_core::{CacheConfig, CacheError, JurisdictionTier, Profile, ProfileKey, Timestamp};

use super::profile_key::{decode_key, encode_key, tier_prefix};
use super::traits::{CacheEntry, DurableBackend};

const TIMESTAMP_LEN: usize = 8;

/// LMDB-backed durable cache.
pub struct LmdbDurableBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbDurableBackend {
    /// Open (or create) the LMDB environment at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&path).map_err(|e| CacheError::Io {
            reason: e.to_string(),
        })?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| CacheError::Backend {
            reason: format!("failed to open LMDB environment: {}", e),
        })?;

        let mut wtxn = env.write_txn().map_err(transaction_error)?;
        let db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, None)
                .map_err(|e| CacheError::Backend {
                    reason: format!("failed to open database: {}", e),
                })?;
        wtxn.commit().map_err(transaction_error)?;

        Ok(Self { env, db })
    }

    /// Open using the path and map size from configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        Self::new(&config.lmdb_path, config.lmdb_max_size_mb)
    }

    /// Number of stored entries, regardless of age.
    pub fn entry_count(&self) -> Result<u64, CacheError> {
        let rtxn = self.env.read_txn().map_err(transaction_error)?;
        self.db.len(&rtxn).map_err(transaction_error)
    }

    /// Number of stored entries for one tier.
    pub fn tier_count(&self, tier: JurisdictionTier) -> Result<u64, CacheError> {
        let prefix = tier_prefix(tier);
        let rtxn = self.env.read_txn().map_err(transaction_error)?;
        let iter = self.db.iter(&rtxn).map_err(transaction_error)?;

        let mut count = 0u64;
        for result in iter {
            let (key, _) = result.map_err(transaction_error)?;
            if key.starts_with(&prefix) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl DurableBackend for LmdbDurableBackend {
    async fn get(&self, key: &ProfileKey) -> Result<Option<CacheEntry>, CacheError> {
        let encoded_key = encode_key(key);
        let rtxn = self.env.read_txn().map_err(transaction_error)?;

        match self.db.get(&rtxn, &encoded_key).map_err(transaction_error)? {
            Some(bytes) => {
                let (written_at, profile) = decode_value(bytes)?;
                Ok(Some(CacheEntry::new(key.clone(), profile, written_at)))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let encoded_key = encode_key(&entry.key);
        let full_bytes = encode_value(entry.written_at, &entry.profile)?;

        let mut wtxn = self.env.write_txn().map_err(transaction_error)?;
        self.db
            .put(&mut wtxn, &encoded_key, &full_bytes)
            .map_err(transaction_error)?;
        wtxn.commit().map_err(transaction_error)?;

        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let rtxn = self.env.read_txn().map_err(transaction_error)?;
        let iter = self.db.iter(&rtxn).map_err(transaction_error)?;

        let mut entries = Vec::new();
        for result in iter {
            let (key_bytes, value_bytes) = result.map_err(transaction_error)?;
            let Some(key) = decode_key(key_bytes) else {
                tracing::warn!(key_len = key_bytes.len(), "skipping undecodable cache key");
                continue;
            };
            match decode_value(value_bytes) {
                Ok((written_at, profile)) => {
                    entries.push(CacheEntry::new(key, profile, written_at))
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping undecodable cache entry")
                }
            }
        }

        Ok(entries)
    }
}

fn transaction_error(e: heed::Error) -> CacheError {
    CacheError::Transaction {
        reason: e.to_string(),
    }
}

fn encode_value(written_at: Timestamp, profile: &Profile) -> Result<Vec<u8>, CacheError> {
    let value_bytes = serde_json::to_vec(profile).map_err(|e| CacheError::Serialization {
        reason: e.to_string(),
    })?;

    let mut full_bytes = Vec::with_capacity(TIMESTAMP_LEN + value_bytes.len());
    full_bytes.extend_from_slice(&written_at.timestamp_millis().to_le_bytes());
    full_bytes.extend_from_slice(&value_bytes);
    Ok(full_bytes)
}

fn decode_value(bytes: &[u8]) -> Result<(Timestamp, Profile), CacheError> {
    if bytes.len() < TIMESTAMP_LEN {
        return Err(CacheError::Deserialization {
            reason: format!("value too short: {} bytes", bytes.len()),
        });
    }

    let mut timestamp_bytes = [0u8; TIMESTAMP_LEN];
    timestamp_bytes.copy_from_slice(&bytes[..TIMESTAMP_LEN]);
    let millis = i64::from_le_bytes(timestamp_bytes);
    let written_at: DateTime<Utc> =
        DateTime::from_timestamp_millis(millis).ok_or_else(|| CacheError::Deserialization {
            reason: format!("invalid timestamp: {}", millis),
        })?;

    let profile: Profile =
        serde_json::from_slice(&bytes[TIMESTAMP_LEN..]).map_err(|e| CacheError::Deserialization {
            reason: e.to_string(),
        })?;

    Ok((written_at, profile))
}
