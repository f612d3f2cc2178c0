//! Source Health Monitor
//!
//! Probes every configured source concurrently, each under the same short
//! timeout, and folds the results into a [`HealthVector`]. A probe round
//! never fails: errors and timeouts are reported as unreachable entries.
//! Each source has at most one probe, so a vector entry is never shadowed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use spendwatch_core::{ConfigError, HealthConfig, HealthVector, SourceHealth, SourceKind};
use spendwatch_sources::SourceProbe;
use tokio::sync::RwLock;

pub struct HealthMonitor {
    probes: Vec<Arc<dyn SourceProbe>>,
    timeout: Duration,
    latest: RwLock<HealthVector>,
}

impl HealthMonitor {
    pub fn new(probes: Vec<Arc<dyn SourceProbe>>, config: &HealthConfig) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for probe in &probes {
            let source = probe.source();
            if !seen.insert(source) {
                return Err(ConfigError::InvalidValue {
                    field: "health.probes".to_string(),
                    value: source.to_string(),
                    reason: "more than one probe for the same source".to_string(),
                });
            }
        }

        Ok(Self {
            probes,
            timeout: config.probe_timeout,
            latest: RwLock::new(HealthVector::new()),
        })
    }

    pub fn sources(&self) -> Vec<SourceKind> {
        self.probes.iter().map(|p| p.source()).collect()
    }

    /// Probe every source once and retain the result.
    pub async fn probe(&self) -> HealthVector {
        let results = join_all(self.probes.iter().map(|probe| self.probe_one(probe.as_ref()))).await;
        let vector: HealthVector = results.into_iter().collect();

        let unreachable = vector.unreachable_sources();
        if unreachable.is_empty() {
            tracing::debug!(sources = vector.len(), "all sources reachable");
        } else {
            tracing::warn!(unreachable = ?unreachable, "sources unreachable");
        }

        *self.latest.write().await = vector.clone();
        vector
    }

    /// Result of the most recent probe round; empty before the first one.
    pub async fn latest(&self) -> HealthVector {
        self.latest.read().await.clone()
    }

    async fn probe_one(&self, probe: &dyn SourceProbe) -> (SourceKind, SourceHealth) {
        let source = probe.source();
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, probe.probe()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let probed_at = Utc::now();

        let health = match outcome {
            Ok(Ok(())) => SourceHealth::reachable(probed_at, elapsed_ms),
            Ok(Err(e)) => SourceHealth::unreachable(probed_at, e.to_string()).with_latency(elapsed_ms),
            Err(_) => SourceHealth::unreachable(
                probed_at,
                format!("probe timed out after {}ms", self.timeout.as_millis()),
            ),
        };
        (source, health)
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("sources", &self.sources())
            .field("timeout", &self.timeout)
            .finish()
    }
}
