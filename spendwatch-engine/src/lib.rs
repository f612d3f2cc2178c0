//! SPENDWATCH Engine
//!
//! Aggregation and refresh runtime:
//!
//! - [`Orchestrator`] fans a profile fetch out to every applicable source
//!   adapter, merges by field group and writes through the tiered cache.
//! - [`RefreshScheduler`] owns one consumer's refresh state machine, its
//!   auto-refresh timer and dataset watcher.
//! - [`HealthMonitor`] probes every source under a timeout.
//! - [`AuditService`] ties them together behind one facade.

pub mod constants;
pub mod health;
pub mod merge;
pub mod orchestrator;
pub mod scheduler;
pub mod service;
pub mod task;
pub mod telemetry;
pub mod watcher;

pub use health::HealthMonitor;
pub use merge::{merge_outcomes, next_last_updated, SourceOutcome};
pub use orchestrator::{BatchFetch, FetchMode, Orchestrator};
pub use scheduler::{
    apply_batch, ConsumerError, ConsumerState, Phase, RefreshOutcome, RefreshScheduler,
    RefreshSummary, StateListener,
};
pub use service::AuditService;
pub use task::{ScheduledTask, StopHandle};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig, TelemetryError};
pub use watcher::{AvailabilityTracker, DatasetAvailability, Transition};
