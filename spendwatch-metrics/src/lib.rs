//! SPENDWATCH Metrics - Derived Profile Metrics
//!
//! Pure functions over profile data: the five-tier efficiency rating and
//! the red-flag heuristics. Nothing here performs I/O.

mod efficiency;
mod red_flags;

pub use efficiency::{compute_efficiency_rating, profile_efficiency, utilization};
pub use red_flags::{dedupe_flags, dedupe_records, generate_red_flags};

use spendwatch_core::{Profile, RedFlagPolicy};

/// Recompute a profile's efficiency rating and red flags from its own fields.
///
/// Consumes the profile and returns the enriched replacement.
pub fn enrich(mut profile: Profile, policy: &RedFlagPolicy) -> Profile {
    profile.efficiency = profile_efficiency(&profile);
    profile.red_flags = generate_red_flags(&profile.spending, &profile.staffing, policy);
    profile
}
