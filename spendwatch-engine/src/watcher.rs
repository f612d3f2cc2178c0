//! Dataset availability watcher.
//!
//! Tracks the published/unpublished state of a future dataset between polls
//! so that a refresh fires once per unavailable-to-available transition. A
//! transition stays pending until its refresh has actually started.

use std::sync::atomic::{AtomicBool, Ordering};

pub use spendwatch_sources::DatasetAvailability;

/// Change observed by a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameAvailable,
    BecameUnavailable,
    Unchanged,
}

/// Last observed availability. Starts as unavailable.
#[derive(Debug, Default)]
pub struct AvailabilityTracker {
    available: AtomicBool,
    refresh_pending: AtomicBool,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Record a poll result and report what changed.
    pub fn observe(&self, available: bool) -> Transition {
        let was = self.available.swap(available, Ordering::AcqRel);
        match (was, available) {
            (false, true) => {
                self.refresh_pending.store(true, Ordering::Release);
                Transition::BecameAvailable
            }
            (true, false) => Transition::BecameUnavailable,
            _ => Transition::Unchanged,
        }
    }

    /// Whether a transition is still waiting for its refresh.
    pub fn refresh_pending(&self) -> bool {
        self.refresh_pending.load(Ordering::Acquire)
    }

    /// Clear the pending refresh once one has run for the transition.
    pub fn refresh_started(&self) {
        self.refresh_pending.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_available_poll_is_a_transition() {
        let tracker = AvailabilityTracker::new();
        assert!(!tracker.is_available());
        assert_eq!(tracker.observe(false), Transition::Unchanged);
        assert_eq!(tracker.observe(true), Transition::BecameAvailable);
        assert_eq!(tracker.observe(true), Transition::Unchanged);
        assert_eq!(tracker.observe(true), Transition::Unchanged);
    }

    #[test]
    fn test_transition_stays_pending_until_refresh_starts() {
        let tracker = AvailabilityTracker::new();
        assert!(!tracker.refresh_pending());
        tracker.observe(true);
        assert!(tracker.refresh_pending());
        assert_eq!(tracker.observe(true), Transition::Unchanged);
        assert!(tracker.refresh_pending());
        tracker.refresh_started();
        assert!(!tracker.refresh_pending());
        tracker.observe(true);
        assert!(!tracker.refresh_pending());
    }

    #[test]
    fn test_flapping_retriggers() {
        let tracker = AvailabilityTracker::new();
        assert_eq!(tracker.observe(true), Transition::BecameAvailable);
        assert_eq!(tracker.observe(false), Transition::BecameUnavailable);
        assert_eq!(tracker.observe(true), Transition::BecameAvailable);
    }
}
