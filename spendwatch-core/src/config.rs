//! Configuration types

use crate::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// CACHE
// ============================================================================

/// Configuration for the two-tier profile cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long an entry stays authoritative in the in-process layer.
    pub fast_ttl: Duration,
    /// How long an entry stays authoritative in the durable layer.
    pub durable_ttl: Duration,
    /// Directory holding the LMDB environment.
    pub lmdb_path: PathBuf,
    /// LMDB map size in megabytes.
    pub lmdb_max_size_mb: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fast_ttl: Duration::from_secs(5 * 60),
            durable_ttl: Duration::from_secs(24 * 60 * 60),
            lmdb_path: PathBuf::from("./data/spendwatch-cache"),
            lmdb_max_size_mb: 256,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fast_ttl(mut self, ttl: Duration) -> Self {
        self.fast_ttl = ttl;
        self
    }

    pub fn with_durable_ttl(mut self, ttl: Duration) -> Self {
        self.durable_ttl = ttl;
        self
    }

    pub fn with_lmdb_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lmdb_path = path.into();
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `SPENDWATCH_CACHE_FAST_TTL_SECS` (default: 300)
    /// - `SPENDWATCH_CACHE_DURABLE_TTL_SECS` (default: 86400)
    /// - `SPENDWATCH_CACHE_LMDB_PATH` (default: ./data/spendwatch-cache)
    /// - `SPENDWATCH_CACHE_LMDB_MAX_SIZE_MB` (default: 256)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fast_ttl: env_secs("SPENDWATCH_CACHE_FAST_TTL_SECS", defaults.fast_ttl),
            durable_ttl: env_secs("SPENDWATCH_CACHE_DURABLE_TTL_SECS", defaults.durable_ttl),
            lmdb_path: std::env::var("SPENDWATCH_CACHE_LMDB_PATH")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.lmdb_path),
            lmdb_max_size_mb: env_or(
                "SPENDWATCH_CACHE_LMDB_MAX_SIZE_MB",
                defaults.lmdb_max_size_mb,
            ),
        }
    }
}

// ============================================================================
// REFRESH / AGGREGATION / HEALTH
// ============================================================================

/// Background refresh cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Interval between automatic refreshes.
    pub interval: Duration,
    /// Interval between dataset availability polls.
    pub dataset_poll_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            dataset_poll_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl RefreshConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: env_secs("SPENDWATCH_REFRESH_INTERVAL_SECS", defaults.interval),
            dataset_poll_interval: env_secs(
                "SPENDWATCH_DATASET_POLL_INTERVAL_SECS",
                defaults.dataset_poll_interval,
            ),
        }
    }
}

/// Fan-out limits for batch fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub max_concurrent_fetches: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
        }
    }
}

impl AggregationConfig {
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_fetches: env_or(
                "SPENDWATCH_MAX_CONCURRENT_FETCHES",
                defaults.max_concurrent_fetches,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Upper bound on a single reachability probe.
    pub probe_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl HealthConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            probe_timeout: env_millis("SPENDWATCH_PROBE_TIMEOUT_MS", defaults.probe_timeout),
        }
    }
}

// ============================================================================
// RED FLAG POLICY
// ============================================================================

/// Share-of-total thresholds for one spend category, in percent.
///
/// Both thresholds are exclusive: a share equal to `high_pct` is not high.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationThreshold {
    pub category: SpendCategory,
    pub high_pct: f64,
    pub medium_pct: f64,
}

impl ConcentrationThreshold {
    pub const fn new(category: SpendCategory, high_pct: f64, medium_pct: f64) -> Self {
        Self {
            category,
            high_pct,
            medium_pct,
        }
    }
}

/// Tunable thresholds for red-flag generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlagPolicy {
    pub concentration: Vec<ConcentrationThreshold>,
    /// Single transactions strictly above this amount are outliers.
    pub outlier_amount: f64,
    pub outlier_severity: Severity,
    /// Same-day same-category groups strictly above this combined amount are flagged.
    pub same_day_amount: f64,
}

impl Default for RedFlagPolicy {
    fn default() -> Self {
        Self {
            concentration: vec![
                ConcentrationThreshold::new(SpendCategory::Fuel, 25.0, 15.0),
                ConcentrationThreshold::new(SpendCategory::Travel, 40.0, 30.0),
                ConcentrationThreshold::new(SpendCategory::Meals, 15.0, 10.0),
                ConcentrationThreshold::new(SpendCategory::PublicRelations, 30.0, 20.0),
            ],
            outlier_amount: 10_000.0,
            outlier_severity: Severity::High,
            same_day_amount: 5_000.0,
        }
    }
}

impl RedFlagPolicy {
    pub fn with_outlier_amount(mut self, amount: f64) -> Self {
        self.outlier_amount = amount;
        self
    }

    pub fn with_outlier_severity(mut self, severity: Severity) -> Self {
        self.outlier_severity = severity;
        self
    }

    pub fn with_same_day_amount(mut self, amount: f64) -> Self {
        self.same_day_amount = amount;
        self
    }

    /// Replace the threshold for `threshold.category`, or add it.
    pub fn with_concentration(mut self, threshold: ConcentrationThreshold) -> Self {
        match self
            .concentration
            .iter_mut()
            .find(|t| t.category == threshold.category)
        {
            Some(existing) => *existing = threshold,
            None => self.concentration.push(threshold),
        }
        self
    }

    /// Environment variables:
    /// - `SPENDWATCH_OUTLIER_AMOUNT` (default: 10000)
    /// - `SPENDWATCH_OUTLIER_SEVERITY` (default: high)
    /// - `SPENDWATCH_SAME_DAY_AMOUNT` (default: 5000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            concentration: defaults.concentration,
            outlier_amount: env_or("SPENDWATCH_OUTLIER_AMOUNT", defaults.outlier_amount),
            outlier_severity: env_or("SPENDWATCH_OUTLIER_SEVERITY", defaults.outlier_severity),
            same_day_amount: env_or("SPENDWATCH_SAME_DAY_AMOUNT", defaults.same_day_amount),
        }
    }
}

// ============================================================================
// MASTER CONFIG
// ============================================================================

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpendwatchConfig {
    pub cache: CacheConfig,
    pub refresh: RefreshConfig,
    pub aggregation: AggregationConfig,
    pub health: HealthConfig,
    pub red_flags: RedFlagPolicy,
}

impl SpendwatchConfig {
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            refresh: RefreshConfig::from_env(),
            aggregation: AggregationConfig::from_env(),
            health: HealthConfig::from_env(),
            red_flags: RedFlagPolicy::from_env(),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - durable_ttl > fast_ttl > 0
    /// - max_concurrent_fetches > 0
    /// - refresh and probe intervals are positive
    /// - every concentration threshold has medium < high
    pub fn validate(&self) -> SpendwatchResult<()> {
        if self.cache.fast_ttl.is_zero() {
            return Err(SpendwatchError::Config(ConfigError::InvalidValue {
                field: "cache.fast_ttl".to_string(),
                value: format!("{:?}", self.cache.fast_ttl),
                reason: "fast_ttl must be positive".to_string(),
            }));
        }

        if self.cache.durable_ttl <= self.cache.fast_ttl {
            return Err(SpendwatchError::Config(ConfigError::IncompatibleOptions {
                option_a: format!("cache.durable_ttl={:?}", self.cache.durable_ttl),
                option_b: format!("cache.fast_ttl={:?}", self.cache.fast_ttl),
            }));
        }

        if self.cache.lmdb_max_size_mb == 0 {
            return Err(SpendwatchError::Config(ConfigError::InvalidValue {
                field: "cache.lmdb_max_size_mb".to_string(),
                value: "0".to_string(),
                reason: "lmdb_max_size_mb must be positive".to_string(),
            }));
        }

        if self.aggregation.max_concurrent_fetches == 0 {
            return Err(SpendwatchError::Config(ConfigError::InvalidValue {
                field: "aggregation.max_concurrent_fetches".to_string(),
                value: "0".to_string(),
                reason: "max_concurrent_fetches must be greater than 0".to_string(),
            }));
        }

        if self.refresh.interval.is_zero() {
            return Err(SpendwatchError::Config(ConfigError::InvalidValue {
                field: "refresh.interval".to_string(),
                value: format!("{:?}", self.refresh.interval),
                reason: "interval must be positive".to_string(),
            }));
        }

        if self.refresh.dataset_poll_interval.is_zero() {
            return Err(SpendwatchError::Config(ConfigError::InvalidValue {
                field: "refresh.dataset_poll_interval".to_string(),
                value: format!("{:?}", self.refresh.dataset_poll_interval),
                reason: "dataset_poll_interval must be positive".to_string(),
            }));
        }

        if self.health.probe_timeout.is_zero() {
            return Err(SpendwatchError::Config(ConfigError::InvalidValue {
                field: "health.probe_timeout".to_string(),
                value: format!("{:?}", self.health.probe_timeout),
                reason: "probe_timeout must be positive".to_string(),
            }));
        }

        for threshold in &self.red_flags.concentration {
            if threshold.medium_pct >= threshold.high_pct {
                return Err(SpendwatchError::Config(ConfigError::InvalidValue {
                    field: format!("red_flags.concentration.{}", threshold.category),
                    value: format!("high={} medium={}", threshold.high_pct, threshold.medium_pct),
                    reason: "medium threshold must be below high threshold".to_string(),
                }));
            }
        }

        Ok(())
    }
}

// ============================================================================
// ENV HELPERS
// ============================================================================

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_millis(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

// =============================================================================
// TESTS
// =============================================================================
