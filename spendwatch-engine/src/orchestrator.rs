//! Aggregation Orchestrator
//!
//! Fans a profile fetch out to every adapter applicable to the identity's
//! tier, isolates per-adapter failures, merges by field group, enriches with
//! derived metrics and writes the result through the cache.
//!
//! # Failure model
//!
//! - One adapter failing degrades only the groups it owns.
//! - Every adapter failing (or returning nothing) yields `None`; the cached
//!   value is left untouched as the last good state.
//! - `fetch_all` never fails as a whole; unproducible keys are returned in
//!   [`BatchFetch::failed`].

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use spendwatch_core::{
    new_refresh_id, AggregationConfig, Profile, ProfileKey, RedFlagPolicy, TrackedIdentity,
};
use spendwatch_metrics::enrich;
use spendwatch_sources::{AdapterRegistry, FetchParams};
use spendwatch_storage::{CacheRead, DurableBackend, FastLayer, TieredCache};

use crate::merge::{merge_outcomes, SourceOutcome};

/// Whether a fetch may be answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Return a valid cached profile when one exists.
    PreferCache,
    /// Always go to the sources.
    ForceRefresh,
}

/// Result of a batch fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchFetch {
    /// Produced profiles, in input order.
    pub profiles: Vec<Profile>,
    /// Keys for which nothing could be produced, in input order.
    pub failed: Vec<ProfileKey>,
}

impl BatchFetch {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-identity fan-out over the adapter registry.
pub struct Orchestrator<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    cache: TieredCache<F, D>,
    registry: Arc<AdapterRegistry>,
    policy: Arc<RedFlagPolicy>,
    aggregation: AggregationConfig,
    reference_year: Option<i32>,
}

impl<F, D> Clone for Orchestrator<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            registry: Arc::clone(&self.registry),
            policy: Arc::clone(&self.policy),
            aggregation: self.aggregation.clone(),
            reference_year: self.reference_year,
        }
    }
}

impl<F, D> Orchestrator<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    pub fn new(cache: TieredCache<F, D>, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            cache,
            registry,
            policy: Arc::new(RedFlagPolicy::default()),
            aggregation: AggregationConfig::default(),
            reference_year: None,
        }
    }

    pub fn with_policy(mut self, policy: RedFlagPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationConfig) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Pin year-scoped feeds to `year` instead of the current one.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    pub fn cache(&self) -> &TieredCache<F, D> {
        &self.cache
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Fetch one profile.
    pub async fn fetch_entity(&self, identity: &TrackedIdentity, mode: FetchMode) -> Option<Profile> {
        let key = identity.key();
        let previous = self.cache.get(&key).await.map(CacheRead::into_value);

        if mode == FetchMode::PreferCache {
            if let Some(cached) = previous {
                tracing::trace!(key = %key, "serving profile from cache");
                return Some(cached);
            }
        }

        let adapters = self.registry.adapters_for(identity.tier).await;
        if adapters.is_empty() {
            let fallback = self.registry.static_profile(&key).await;
            if fallback.is_none() {
                tracing::debug!(key = %key, "no adapters and no static profile for tier");
            }
            return fallback.map(|p| enrich(p, &self.policy));
        }

        let mut params = FetchParams::new(new_refresh_id());
        if let Some(year) = self.reference_year {
            params = params.with_year(year);
        }

        let outcomes: Vec<SourceOutcome> = join_all(adapters.iter().map(|adapter| {
            let params = &params;
            async move {
                let result = adapter.fetch(identity, params).await;
                SourceOutcome {
                    source: adapter.source(),
                    owned: adapter.owned_fields().to_vec(),
                    result,
                }
            }
        }))
        .await;

        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                tracing::warn!(
                    key = %key,
                    source = %outcome.source,
                    refresh_id = %params.refresh_id,
                    error = %e,
                    "source adapter failed"
                );
            }
        }

        let Some(merged) = merge_outcomes(identity, &outcomes, previous.as_ref(), Utc::now())
        else {
            tracing::warn!(
                key = %key,
                adapters = outcomes.len(),
                "no source produced data; keeping last good state"
            );
            return None;
        };

        let profile = enrich(merged, &self.policy);
        self.cache.put(&key, profile.clone()).await;
        tracing::debug!(
            key = %key,
            red_flags = profile.red_flags.len(),
            efficiency = %profile.efficiency,
            "profile refreshed"
        );
        Some(profile)
    }

    /// Fetch many profiles with bounded concurrency.
    pub async fn fetch_all(&self, identities: &[TrackedIdentity], mode: FetchMode) -> BatchFetch {
        let limit = self.aggregation.max_concurrent_fetches.max(1);

        let fetches: Vec<_> = identities
            .iter()
            .enumerate()
            .map(|(index, identity)| async move {
                (index, identity.key(), self.fetch_entity(identity, mode).await)
            })
            .collect();

        let mut results: Vec<(usize, ProfileKey, Option<Profile>)> = stream::iter(fetches)
            .buffer_unordered(limit)
            .collect()
            .await;
        results.sort_by_key(|(index, _, _)| *index);

        let mut batch = BatchFetch::default();
        for (_, key, profile) in results {
            match profile {
                Some(profile) => batch.profiles.push(profile),
                None => batch.failed.push(key),
            }
        }

        if !batch.failed.is_empty() {
            tracing::warn!(
                failed = batch.failed.len(),
                succeeded = batch.profiles.len(),
                keys = ?batch.failed.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "batch fetch finished with failures"
            );
        }
        batch
    }
}

impl<F, D> std::fmt::Debug for Orchestrator<F, D>
where
    F: FastLayer,
    D: DurableBackend,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("aggregation", &self.aggregation)
            .field("reference_year", &self.reference_year)
            .finish_non_exhaustive()
    }
}
