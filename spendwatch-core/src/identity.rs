//! Identity types for SPENDWATCH entities

use crate::JurisdictionTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash for deduplication.
pub type ContentHash = [u8; 32];

/// Identifier of one refresh round, UUIDv7 so rounds sort by start time.
pub type RefreshId = Uuid;

/// Generate a new UUIDv7 RefreshId.
pub fn new_refresh_id() -> RefreshId {
    Uuid::now_v7()
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Cache key for a profile, rendered as `"{tier}:{id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileKey {
    tier: JurisdictionTier,
    id: String,
}

impl ProfileKey {
    pub fn new(tier: JurisdictionTier, id: impl Into<String>) -> Self {
        Self {
            tier,
            id: id.into(),
        }
    }

    pub fn tier(&self) -> JurisdictionTier {
        self.tier
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tier, self.id)
    }
}

impl FromStr for ProfileKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tier, id) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid ProfileKey (missing ':'): {}", s))?;
        if id.is_empty() {
            return Err(format!("Invalid ProfileKey (empty id): {}", s));
        }
        Ok(Self::new(tier.parse()?, id))
    }
}

/// What a consumer asks the engine to track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedIdentity {
    /// Upstream identifier, unique within a tier
    pub id: String,
    pub display_name: String,
    pub party: String,
    pub tier: JurisdictionTier,
    /// State or municipality code
    pub region: String,
}

impl TrackedIdentity {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        tier: JurisdictionTier,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            party: String::new(),
            tier,
            region: String::new(),
        }
    }

    pub fn with_party(mut self, party: impl Into<String>) -> Self {
        self.party = party.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Cache key for this identity.
    pub fn key(&self) -> ProfileKey {
        ProfileKey::new(self.tier, self.id.clone())
    }
}
