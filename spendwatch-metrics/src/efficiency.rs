//! Five-tier efficiency rating

use spendwatch_core::{EfficiencyRating, Profile};

/// Upper bounds (inclusive) of each tier below Critical.
const TIER_BOUNDS: [(f64, EfficiencyRating); 4] = [
    (0.50, EfficiencyRating::Excellent),
    (0.70, EfficiencyRating::Good),
    (0.85, EfficiencyRating::Moderate),
    (0.95, EfficiencyRating::Poor),
];

/// `used / ceiling`, or 0 when the ceiling is not positive.
pub fn utilization(used: f64, ceiling: f64) -> f64 {
    if ceiling > 0.0 {
        used / ceiling
    } else {
        0.0
    }
}

/// Classify the average of spend and staff-cost utilization.
///
/// Boundary values belong to the better tier. Negative inputs count as 0 and
/// a non-finite average is `Critical`.
pub fn compute_efficiency_rating(
    spend_utilization: f64,
    staff_cost_utilization: f64,
) -> EfficiencyRating {
    let average = (clamp_negative(spend_utilization) + clamp_negative(staff_cost_utilization)) / 2.0;
    if !average.is_finite() {
        return EfficiencyRating::Critical;
    }

    TIER_BOUNDS
        .iter()
        .find(|(bound, _)| average <= *bound)
        .map(|(_, rating)| *rating)
        .unwrap_or(EfficiencyRating::Critical)
}

/// Efficiency rating derived from a profile's own spending and staffing.
pub fn profile_efficiency(profile: &Profile) -> EfficiencyRating {
    compute_efficiency_rating(
        utilization(profile.total_spend(), profile.spend_ceiling),
        utilization(profile.staffing.staff_cost, profile.staffing.staff_cost_ceiling),
    )
}

fn clamp_negative(value: f64) -> f64 {
    if value < 0.0 {
        0.0
    } else {
        value
    }
}
