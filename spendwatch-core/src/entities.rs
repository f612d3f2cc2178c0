//! Profile and record types

use crate::{
    compute_content_hash, ContentHash, EfficiencyRating, FieldGroup, ProfileKey, RedFlagKind,
    Severity, SourceKind, SpendCategory, Timestamp, TrackedIdentity,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// SPENDING
// ============================================================================

/// A single expense line reported by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendRecord {
    pub date: NaiveDate,
    pub category: SpendCategory,
    pub amount: f64,
    pub vendor: String,
    pub document_id: Option<String>,
    pub source: SourceKind,
}

impl SpendRecord {
    /// Content fingerprint over every field.
    ///
    /// Two records share a fingerprint only when they are identical in every
    /// field, which is what exact-duplicate removal keys on.
    pub fn fingerprint(&self) -> ContentHash {
        let canonical = serde_json::json!({
            "amount": self.amount,
            "category": self.category.as_str(),
            "date": self.date.to_string(),
            "document_id": self.document_id,
            "source": self.source.as_str(),
            "vendor": self.vendor,
        });
        compute_content_hash(canonical.to_string().as_bytes())
    }

    /// Hex form of [`SpendRecord::fingerprint`], for logs and flag details.
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint())
    }
}

/// Staff/advisor utilization for an official's office.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StaffStats {
    pub utilized_staff: u32,
    pub max_staff: u32,
    pub staff_cost: f64,
    pub staff_cost_ceiling: f64,
    pub source: Option<SourceKind>,
}

impl StaffStats {
    pub fn at_ceiling(&self) -> bool {
        self.max_staff > 0 && self.utilized_staff >= self.max_staff
    }
}

/// Campaign and election data for the latest election.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElectoralSummary {
    pub election_year: Option<i32>,
    pub votes: u64,
    pub elected: bool,
    pub campaign_spend: f64,
    pub campaign_donations: f64,
}

/// Sanctions and public-contract data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransparencySummary {
    pub sanctions: u32,
    pub public_contracts: u32,
    pub contract_value: f64,
    pub notes: Vec<String>,
}

/// Corrections to the identity fields a consumer supplied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IdentityPatch {
    pub display_name: Option<String>,
    pub party: Option<String>,
    pub region: Option<String>,
}

impl IdentityPatch {
    pub fn apply(&self, identity: &mut TrackedIdentity) {
        if let Some(name) = &self.display_name {
            identity.display_name = name.clone();
        }
        if let Some(party) = &self.party {
            identity.party = party.clone();
        }
        if let Some(region) = &self.region {
            identity.region = region.clone();
        }
    }
}

/// Output of a source adapter. Each variant belongs to exactly one field group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NormalizedRecord {
    Identity(IdentityPatch),
    Expense(SpendRecord),
    SpendCeiling(f64),
    Staffing(StaffStats),
    Electoral(ElectoralSummary),
    Transparency(TransparencySummary),
}

impl NormalizedRecord {
    pub fn field_group(&self) -> FieldGroup {
        match self {
            NormalizedRecord::Identity(_) => FieldGroup::Identity,
            NormalizedRecord::Expense(_) | NormalizedRecord::SpendCeiling(_) => FieldGroup::Spending,
            NormalizedRecord::Staffing(_) => FieldGroup::Staffing,
            NormalizedRecord::Electoral(_) => FieldGroup::Electoral,
            NormalizedRecord::Transparency(_) => FieldGroup::Transparency,
        }
    }
}

// ============================================================================
// RED FLAGS
// ============================================================================

/// Generated anomaly record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlag {
    pub kind: RedFlagKind,
    pub severity: Severity,
    pub description: String,
    pub detail: String,
    pub spend_category: Option<SpendCategory>,
    pub source: Option<SourceKind>,
}

impl RedFlag {
    pub fn new(kind: RedFlagKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            detail: String::new(),
            spend_category: None,
            source: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_category(mut self, category: SpendCategory) -> Self {
        self.spend_category = Some(category);
        self
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }
}

// ============================================================================
// PROFILE
// ============================================================================

/// Which source supplied a field group, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub source: SourceKind,
    pub group: FieldGroup,
    pub fetched_at: Timestamp,
}

/// Canonical merged record for one tracked official.
///
/// A profile is replaced wholesale on every successful refresh and never
/// patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub identity: TrackedIdentity,
    pub spending: Vec<SpendRecord>,
    pub spend_ceiling: f64,
    pub staffing: StaffStats,
    pub electoral: ElectoralSummary,
    pub transparency: TransparencySummary,
    pub efficiency: EfficiencyRating,
    pub red_flags: Vec<RedFlag>,
    pub provenance: Vec<ProvenanceEntry>,
    pub last_updated: Timestamp,
}

impl Profile {
    /// Empty profile with every field at its default.
    pub fn new(identity: TrackedIdentity, last_updated: Timestamp) -> Self {
        Self {
            identity,
            spending: Vec::new(),
            spend_ceiling: 0.0,
            staffing: StaffStats::default(),
            electoral: ElectoralSummary::default(),
            transparency: TransparencySummary::default(),
            efficiency: EfficiencyRating::Excellent,
            red_flags: Vec::new(),
            provenance: Vec::new(),
            last_updated,
        }
    }

    pub fn key(&self) -> ProfileKey {
        self.identity.key()
    }

    /// Sum of all spend amounts.
    pub fn total_spend(&self) -> f64 {
        self.spending.iter().map(|r| r.amount).sum()
    }

    /// Provenance entry for a field group, if any source supplied it.
    pub fn provenance_for(&self, group: FieldGroup) -> Option<&ProvenanceEntry> {
        self.provenance.iter().find(|p| p.group == group)
    }

    /// Whether `source` is recorded as the supplier of `group`.
    pub fn supplied_by(&self, group: FieldGroup, source: SourceKind) -> bool {
        self.provenance_for(group)
            .map(|p| p.source == source)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JurisdictionTier;
    use chrono::{TimeZone, Utc};

    fn record(amount: f64) -> SpendRecord {
        SpendRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            category: SpendCategory::Fuel,
            amount,
            vendor: "Posto Central".to_string(),
            document_id: Some("NF-1".to_string()),
            source: SourceKind::Chamber,
        }
    }

    #[test]
    fn test_fingerprint_identical_records_match() {
        assert_eq!(record(120.5).fingerprint(), record(120.5).fingerprint());
        assert_eq!(record(120.5).fingerprint_hex().len(), 64);
    }

    #[test]
    fn test_fingerprint_differs_on_any_field() {
        let base = record(120.5);
        assert_ne!(base.fingerprint(), record(120.6).fingerprint());

        let mut other_doc = base.clone();
        other_doc.document_id = None;
        assert_ne!(base.fingerprint(), other_doc.fingerprint());

        let mut other_source = base.clone();
        other_source.source = SourceKind::Senate;
        assert_ne!(base.fingerprint(), other_source.fingerprint());
    }

    #[test]
    fn test_normalized_record_field_groups() {
        assert_eq!(NormalizedRecord::SpendCeiling(1.0).field_group(), FieldGroup::Spending);
        assert_eq!(NormalizedRecord::Expense(record(1.0)).field_group(), FieldGroup::Spending);
        assert_eq!(
            NormalizedRecord::Staffing(StaffStats::default()).field_group(),
            FieldGroup::Staffing
        );
        assert_eq!(
            NormalizedRecord::Identity(IdentityPatch::default()).field_group(),
            FieldGroup::Identity
        );
    }

    #[test]
    fn test_identity_patch_only_overwrites_present_fields() {
        let mut identity = TrackedIdentity::new("1", "Old Name", JurisdictionTier::Senator)
            .with_party("ABC")
            .with_region("SP");
        IdentityPatch {
            party: Some("XYZ".to_string()),
            ..IdentityPatch::default()
        }
        .apply(&mut identity);

        assert_eq!(identity.display_name, "Old Name");
        assert_eq!(identity.party, "XYZ");
        assert_eq!(identity.region, "SP");
    }

    #[test]
    fn test_new_profile_defaults() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let profile = Profile::new(TrackedIdentity::new("1", "A", JurisdictionTier::Senator), at);
        assert!(profile.spending.is_empty());
        assert_eq!(profile.spend_ceiling, 0.0);
        assert_eq!(profile.efficiency, EfficiencyRating::Excellent);
        assert_eq!(profile.total_spend(), 0.0);
        assert!(!profile.supplied_by(FieldGroup::Spending, SourceKind::Senate));
    }

    #[test]
    fn test_staff_at_ceiling() {
        let full = StaffStats {
            utilized_staff: 25,
            max_staff: 25,
            ..StaffStats::default()
        };
        let under = StaffStats {
            utilized_staff: 24,
            max_staff: 25,
            ..StaffStats::default()
        };
        assert!(full.at_ceiling());
        assert!(!under.at_ceiling());
        assert!(!StaffStats::default().at_ceiling());
    }
}
