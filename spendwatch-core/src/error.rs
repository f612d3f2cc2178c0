//! Error types for SPENDWATCH operations

use crate::SourceKind;
use thiserror::Error;

/// Errors turning an untyped source payload into typed records.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unexpected payload shape: expected {expected}, found {found}")]
    UnexpectedShape { expected: String, found: String },
}

/// Errors at the source adapter boundary.
///
/// "No data" is not an error; adapters return an empty record list for it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Transport failure talking to {feed}: {reason}")]
    Transport { feed: SourceKind, reason: String },

    #[error("Request to {feed} timed out after {after_ms}ms")]
    Timeout { feed: SourceKind, after_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Durable cache errors. Never fatal; callers log them and treat them as a miss.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("I/O error: {reason}")]
    Io { reason: String },

    #[error("Transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Deserialization failed: {reason}")]
    Deserialization { reason: String },

    #[error("Backend error: {reason}")]
    Backend { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Master error type for all SPENDWATCH errors.
#[derive(Debug, Clone, Error)]
pub enum SpendwatchError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for SPENDWATCH operations.
pub type SpendwatchResult<T> = Result<T, SpendwatchError>;

// =============================================================================
// TESTS
// =============================================================================
