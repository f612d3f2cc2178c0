//! Source reachability types
//!
//! The health vector is read by consumers alongside entity data. It never
//! influences aggregation.

use crate::{SourceKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reachability of one upstream source at the last probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHealth {
    pub reachable: bool,
    pub last_probed_at: Timestamp,
    /// Probe round-trip time, when the probe completed
    pub latency_ms: Option<u64>,
    /// Failure detail or upstream status line
    pub message: Option<String>,
}

impl SourceHealth {
    /// Create a reachable result.
    pub fn reachable(probed_at: Timestamp, latency_ms: u64) -> Self {
        Self {
            reachable: true,
            last_probed_at: probed_at,
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    /// Create an unreachable result.
    pub fn unreachable(probed_at: Timestamp, message: impl Into<String>) -> Self {
        Self {
            reachable: false,
            last_probed_at: probed_at,
            latency_ms: None,
            message: Some(message.into()),
        }
    }

    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }
}

/// Per-source health, complete for every probed source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HealthVector(BTreeMap<SourceKind, SourceHealth>);

impl HealthVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: SourceKind, health: SourceHealth) {
        self.0.insert(source, health);
    }

    pub fn get(&self, source: SourceKind) -> Option<&SourceHealth> {
        self.0.get(&source)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceKind, &SourceHealth)> {
        self.0.iter()
    }

    /// True when every probed source answered.
    pub fn all_reachable(&self) -> bool {
        self.0.values().all(|h| h.reachable)
    }

    pub fn unreachable_sources(&self) -> Vec<SourceKind> {
        self.0
            .iter()
            .filter(|(_, h)| !h.reachable)
            .map(|(s, _)| *s)
            .collect()
    }
}

impl FromIterator<(SourceKind, SourceHealth)> for HealthVector {
    fn from_iter<I: IntoIterator<Item = (SourceKind, SourceHealth)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_health_vector_collects_and_reports() {
        let now = Utc::now();
        let vector: HealthVector = [
            (SourceKind::Chamber, SourceHealth::reachable(now, 42)),
            (SourceKind::Senate, SourceHealth::unreachable(now, "timed out")),
        ]
        .into_iter()
        .collect();

        assert_eq!(vector.len(), 2);
        assert!(!vector.all_reachable());
        assert_eq!(vector.unreachable_sources(), vec![SourceKind::Senate]);
        assert_eq!(vector.get(SourceKind::Chamber).unwrap().latency_ms, Some(42));
    }

    #[test]
    fn test_health_vector_serializes_as_map() {
        let now = Utc::now();
        let mut vector = HealthVector::new();
        vector.insert(SourceKind::Electoral, SourceHealth::reachable(now, 7));
        let json = serde_json::to_value(&vector).unwrap();
        assert_eq!(json["Electoral"]["reachable"], serde_json::json!(true));
    }
}
