//! Constants for the SPENDWATCH engine
//!
//! Environment variable names and defaults that are not part of
//! `SpendwatchConfig`.

// ============================================================================
// LOGGING
// ============================================================================

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn,spendwatch=info";

/// `json` or `pretty`.
pub const LOG_FORMAT_ENV: &str = "SPENDWATCH_LOG_FORMAT";

// ============================================================================
// STATUS BINARY
// ============================================================================

/// Comma-separated `source=url` pairs probed by `spendwatch-status`.
pub const PROBE_URLS_ENV: &str = "SPENDWATCH_PROBE_URLS";

// ============================================================================
// ORCHESTRATION
// ============================================================================

/// Step added to `last_updated` when the clock has not moved past the
/// previous refresh.
pub const LAST_UPDATED_STEP_MILLIS: i64 = 1;
