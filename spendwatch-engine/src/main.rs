//! SPENDWATCH status entry point
//!
//! Opens the durable profile store, prints a summary of the valid cached
//! profiles and, when probe URLs are configured, a source health vector.

use std::sync::Arc;

use serde_json::json;
use spendwatch_core::{CacheError, ConfigError, SpendwatchConfig, SpendwatchError};
use spendwatch_engine::constants::PROBE_URLS_ENV;
use spendwatch_engine::{init_tracing, HealthMonitor, TelemetryConfig, TelemetryError};
use spendwatch_sources::{parse_probe_urls, SourceProbe};
use spendwatch_storage::{LmdbDurableBackend, MemoryLayer, TieredCache};
use thiserror::Error;

#[derive(Debug, Error)]
enum StatusError {
    #[error(transparent)]
    Spendwatch(#[from] SpendwatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> Result<(), StatusError> {
    init_tracing(&TelemetryConfig::from_env())?;

    let config = SpendwatchConfig::from_env();
    config.validate()?;

    let durable = Arc::new(LmdbDurableBackend::from_config(&config.cache)?);
    let cache = TieredCache::new(Arc::new(MemoryLayer::new()), durable, config.cache.clone());

    let profiles = cache.get_all_valid().await;
    tracing::info!(
        profiles = profiles.len(),
        path = %config.cache.lmdb_path.display(),
        "loaded cached profiles"
    );

    let summary: Vec<_> = profiles
        .iter()
        .map(|p| {
            json!({
                "key": p.key().to_string(),
                "name": p.identity.display_name,
                "party": p.identity.party,
                "total_spend": p.total_spend(),
                "spend_ceiling": p.spend_ceiling,
                "efficiency": p.efficiency.to_string(),
                "red_flags": p.red_flags.len(),
                "last_updated": p.last_updated,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&json!({ "profiles": summary }))?);

    if let Ok(raw) = std::env::var(PROBE_URLS_ENV) {
        let probes: Vec<Arc<dyn SourceProbe>> = parse_probe_urls(&raw)?
            .into_iter()
            .map(|probe| Arc::new(probe) as Arc<dyn SourceProbe>)
            .collect();
        let monitor = HealthMonitor::new(probes, &config.health)?;
        let health = monitor.probe().await;
        println!("{}", serde_json::to_string_pretty(&json!({ "health": health }))?);
    }

    Ok(())
}
