//! Field-group merge of per-source results into one profile.
//!
//! Each source overwrites only the groups it owns. A group whose owner
//! failed this round keeps the previous profile's value when the provenance
//! shows that owner supplied it; every other unfilled group stays at its
//! default.

use chrono::Duration as ChronoDuration;
use spendwatch_core::{
    FieldGroup, NormalizedRecord, Profile, ProvenanceEntry, SourceError, SourceKind, StaffStats,
    Timestamp, TrackedIdentity,
};

use crate::constants::LAST_UPDATED_STEP_MILLIS;

/// What one adapter produced during a fetch round.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: SourceKind,
    pub owned: Vec<FieldGroup>,
    pub result: Result<Vec<NormalizedRecord>, SourceError>,
}

impl SourceOutcome {
    pub fn succeeded(source: SourceKind, owned: &[FieldGroup], records: Vec<NormalizedRecord>) -> Self {
        Self {
            source,
            owned: owned.to_vec(),
            result: Ok(records),
        }
    }

    pub fn failed(source: SourceKind, owned: &[FieldGroup], error: SourceError) -> Self {
        Self {
            source,
            owned: owned.to_vec(),
            result: Err(error),
        }
    }

    /// Succeeded with at least one record.
    pub fn produced_data(&self) -> bool {
        matches!(&self.result, Ok(records) if !records.is_empty())
    }
}

/// Merge a round of outcomes into a fresh profile.
///
/// Returns `None` when no source produced any record. The result is not
/// enriched; efficiency and red flags are left at their defaults.
pub fn merge_outcomes(
    identity: &TrackedIdentity,
    outcomes: &[SourceOutcome],
    previous: Option<&Profile>,
    now: Timestamp,
) -> Option<Profile> {
    if !outcomes.iter().any(SourceOutcome::produced_data) {
        return None;
    }

    let mut profile = Profile::new(identity.clone(), next_last_updated(previous, now));

    for outcome in outcomes {
        match &outcome.result {
            Ok(records) => apply_records(&mut profile, outcome, records, now),
            Err(_) => {
                if let Some(prev) = previous {
                    carry_over(&mut profile, prev, outcome);
                }
            }
        }
    }

    profile.provenance.sort_by_key(|p| p.group);
    Some(profile)
}

/// `max(now, previous + 1ms)`, so successive refreshes strictly increase.
pub fn next_last_updated(previous: Option<&Profile>, now: Timestamp) -> Timestamp {
    match previous {
        Some(prev) => {
            let floor = prev.last_updated + ChronoDuration::milliseconds(LAST_UPDATED_STEP_MILLIS);
            now.max(floor)
        }
        None => now,
    }
}

fn apply_records(
    profile: &mut Profile,
    outcome: &SourceOutcome,
    records: &[NormalizedRecord],
    now: Timestamp,
) {
    let mut supplied: Vec<FieldGroup> = Vec::new();

    for record in records {
        let group = record.field_group();
        if !outcome.owned.contains(&group) {
            tracing::debug!(
                source = %outcome.source,
                group = %group,
                "dropping record for a group the source does not own"
            );
            continue;
        }

        match record {
            NormalizedRecord::Identity(patch) => patch.apply(&mut profile.identity),
            NormalizedRecord::Expense(expense) => profile.spending.push(expense.clone()),
            NormalizedRecord::SpendCeiling(ceiling) => profile.spend_ceiling = *ceiling,
            NormalizedRecord::Staffing(stats) => {
                profile.staffing = StaffStats {
                    source: stats.source.or(Some(outcome.source)),
                    ..stats.clone()
                }
            }
            NormalizedRecord::Electoral(summary) => profile.electoral = summary.clone(),
            NormalizedRecord::Transparency(summary) => profile.transparency = summary.clone(),
        }

        if !supplied.contains(&group) {
            supplied.push(group);
        }
    }

    for group in supplied {
        profile.provenance.push(ProvenanceEntry {
            source: outcome.source,
            group,
            fetched_at: now,
        });
    }
}

fn carry_over(profile: &mut Profile, previous: &Profile, outcome: &SourceOutcome) {
    for &group in &outcome.owned {
        let Some(entry) = previous.provenance_for(group) else {
            continue;
        };
        if entry.source != outcome.source {
            continue;
        }

        copy_group(previous, profile, group);
        profile.provenance.push(entry.clone());
        tracing::debug!(
            key = %profile.key(),
            source = %outcome.source,
            group = %group,
            "carrying over previous value for failed source"
        );
    }
}

fn copy_group(from: &Profile, to: &mut Profile, group: FieldGroup) {
    match group {
        FieldGroup::Identity => {
            to.identity.display_name = from.identity.display_name.clone();
            to.identity.party = from.identity.party.clone();
            to.identity.region = from.identity.region.clone();
        }
        FieldGroup::Spending => {
            to.spending = from.spending.clone();
            to.spend_ceiling = from.spend_ceiling;
        }
        FieldGroup::Staffing => to.staffing = from.staffing.clone(),
        FieldGroup::Electoral => to.electoral = from.electoral.clone(),
        FieldGroup::Transparency => to.transparency = from.transparency.clone(),
    }
}
