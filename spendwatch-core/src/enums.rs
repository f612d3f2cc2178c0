//! Enum types for SPENDWATCH entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// JURISDICTION & SOURCES
// ============================================================================

/// Jurisdiction tier of a tracked official.
///
/// Each tier is served by its own set of source adapters. A tier can have no
/// adapters at all, in which case a manually registered profile is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JurisdictionTier {
    /// Member of the lower legislative chamber
    FederalDeputy,
    /// Member of the upper house
    Senator,
    /// Member of a state legislature
    StateDeputy,
    /// Municipal councillor
    Councillor,
}

impl JurisdictionTier {
    /// All tiers, in declaration order.
    pub const ALL: [JurisdictionTier; 4] = [
        JurisdictionTier::FederalDeputy,
        JurisdictionTier::Senator,
        JurisdictionTier::StateDeputy,
        JurisdictionTier::Councillor,
    ];

    /// Stable string form used in cache keys.
    pub fn as_key_str(&self) -> &'static str {
        match self {
            JurisdictionTier::FederalDeputy => "federal_deputy",
            JurisdictionTier::Senator => "senator",
            JurisdictionTier::StateDeputy => "state_deputy",
            JurisdictionTier::Councillor => "councillor",
        }
    }
}

impl fmt::Display for JurisdictionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key_str())
    }
}

impl FromStr for JurisdictionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "federaldeputy" | "deputy" => Ok(JurisdictionTier::FederalDeputy),
            "senator" => Ok(JurisdictionTier::Senator),
            "statedeputy" => Ok(JurisdictionTier::StateDeputy),
            "councillor" | "councilor" => Ok(JurisdictionTier::Councillor),
            _ => Err(format!("Invalid JurisdictionTier: {}", s)),
        }
    }
}

/// Upstream data feed a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    /// Lower-chamber expense API
    Chamber,
    /// Upper-house API
    Senate,
    /// Electoral-authority API
    Electoral,
    /// Federal transparency API
    Transparency,
    /// User-uploaded spreadsheet
    Upload,
}

impl SourceKind {
    /// All sources, in declaration order.
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Chamber,
        SourceKind::Senate,
        SourceKind::Electoral,
        SourceKind::Transparency,
        SourceKind::Upload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Chamber => "chamber",
            SourceKind::Senate => "senate",
            SourceKind::Electoral => "electoral",
            SourceKind::Transparency => "transparency",
            SourceKind::Upload => "upload",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "chamber" => Ok(SourceKind::Chamber),
            "senate" => Ok(SourceKind::Senate),
            "electoral" => Ok(SourceKind::Electoral),
            "transparency" => Ok(SourceKind::Transparency),
            "upload" => Ok(SourceKind::Upload),
            _ => Err(format!("Invalid SourceKind: {}", s)),
        }
    }
}

/// Disjoint group of profile fields owned by exactly one source per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldGroup {
    /// Party, region and display name corrections
    Identity,
    /// Expense records and the spending ceiling
    Spending,
    /// Staff/advisor utilization
    Staffing,
    /// Campaign and election data
    Electoral,
    /// Sanctions and public-contract data
    Transparency,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 5] = [
        FieldGroup::Identity,
        FieldGroup::Spending,
        FieldGroup::Staffing,
        FieldGroup::Electoral,
        FieldGroup::Transparency,
    ];
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            FieldGroup::Identity => "identity",
            FieldGroup::Spending => "spending",
            FieldGroup::Staffing => "staffing",
            FieldGroup::Electoral => "electoral",
            FieldGroup::Transparency => "transparency",
        };
        write!(f, "{}", value)
    }
}

// ============================================================================
// SPENDING
// ============================================================================

/// Expense category of a single spend record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpendCategory {
    Fuel,
    Travel,
    Meals,
    PublicRelations,
    Office,
    Lodging,
    Telecom,
    Consulting,
    Other,
}

impl SpendCategory {
    /// Map a free-form label from a source feed onto a category.
    ///
    /// Matching is keyword based and ignores case and diacritics, so
    /// "COMBUSTÍVEIS E LUBRIFICANTES." and "fuel" both land on `Fuel`.
    /// Unknown labels map to `Other`.
    pub fn from_label(label: &str) -> Self {
        let folded = fold_label(label);
        const RULES: &[(&[&str], SpendCategory)] = &[
            (&["fuel", "combustivel", "combustiveis", "lubrificante", "gasoline"], SpendCategory::Fuel),
            (&["passage", "aerea", "airfare", "flight", "travel", "locomocao", "taxi", "toll", "pedagio"], SpendCategory::Travel),
            (&["meal", "alimentacao", "restaurant", "food"], SpendCategory::Meals),
            (&["divulgacao", "publicity", "advertis", "public relations", "marketing"], SpendCategory::PublicRelations),
            (&["escritorio", "office", "material", "postal", "postais", "correio"], SpendCategory::Office),
            (&["hospedagem", "lodging", "hotel"], SpendCategory::Lodging),
            (&["telefon", "telecom", "internet"], SpendCategory::Telecom),
            (&["consultoria", "consult", "pesquisa", "research", "legal"], SpendCategory::Consulting),
        ];

        RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| folded.contains(k)))
            .map(|(_, category)| *category)
            .unwrap_or(SpendCategory::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpendCategory::Fuel => "fuel",
            SpendCategory::Travel => "travel",
            SpendCategory::Meals => "meals",
            SpendCategory::PublicRelations => "public_relations",
            SpendCategory::Office => "office",
            SpendCategory::Lodging => "lodging",
            SpendCategory::Telecom => "telecom",
            SpendCategory::Consulting => "consulting",
            SpendCategory::Other => "other",
        }
    }
}

impl fmt::Display for SpendCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// DERIVED METRICS
// ============================================================================

/// Severity of a red flag. Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            _ => Err(format!("Invalid Severity: {}", s)),
        }
    }
}

/// Five-tier ordinal classification of combined spend/staffing utilization.
///
/// Ordered best to worst, so `Excellent < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum EfficiencyRating {
    #[default]
    Excellent,
    Good,
    Moderate,
    Poor,
    Critical,
}

impl EfficiencyRating {
    /// 1-based tier number (1 = best).
    pub fn tier(&self) -> u8 {
        match self {
            EfficiencyRating::Excellent => 1,
            EfficiencyRating::Good => 2,
            EfficiencyRating::Moderate => 3,
            EfficiencyRating::Poor => 4,
            EfficiencyRating::Critical => 5,
        }
    }
}

impl fmt::Display for EfficiencyRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EfficiencyRating::Excellent => "Excellent",
            EfficiencyRating::Good => "Good",
            EfficiencyRating::Moderate => "Moderate",
            EfficiencyRating::Poor => "Poor",
            EfficiencyRating::Critical => "Critical",
        };
        write!(f, "{}", value)
    }
}

/// Rule that produced a red flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RedFlagKind {
    /// One category takes an outsized share of total spend
    CategoryConcentration,
    /// A single transaction above the absolute outlier amount
    TransactionOutlier,
    /// Several same-category transactions on one date above the cluster amount
    SameDayCluster,
    /// Staff headcount at or above the allowed maximum
    StaffingAtCeiling,
}

impl fmt::Display for RedFlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            RedFlagKind::CategoryConcentration => "category_concentration",
            RedFlagKind::TransactionOutlier => "transaction_outlier",
            RedFlagKind::SameDayCluster => "same_day_cluster",
            RedFlagKind::StaffingAtCeiling => "staffing_at_ceiling",
        };
        write!(f, "{}", value)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Lowercase and strip the Latin diacritics the source feeds use, both
/// precomposed and as combining marks.
fn fold_label(input: &str) -> String {
    input
        .chars()
        .filter(|c| !('\u{0300}'..='\u{036F}').contains(c))
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
            'ç' | 'Ç' => 'c',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_roundtrip_through_key_str() {
        for tier in JurisdictionTier::ALL {
            let parsed: JurisdictionTier = tier.to_string().parse().unwrap();
            assert_eq!(parsed, tier);
        }
    }

    #[test]
    fn test_source_kind_parse_is_lenient() {
        assert_eq!("Chamber".parse::<SourceKind>().unwrap(), SourceKind::Chamber);
        assert_eq!(" senate ".parse::<SourceKind>().unwrap(), SourceKind::Senate);
        assert!("parliament".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_spend_category_from_label() {
        assert_eq!(SpendCategory::from_label("COMBUSTÍVEIS E LUBRIFICANTES."), SpendCategory::Fuel);
        assert_eq!(SpendCategory::from_label("Emissão Bilhete Aéreo"), SpendCategory::Travel);
        assert_eq!(SpendCategory::from_label("DIVULGAÇÃO DA ATIVIDADE PARLAMENTAR."), SpendCategory::PublicRelations);
        assert_eq!(SpendCategory::from_label("Fornecimento de alimentação"), SpendCategory::Meals);
        assert_eq!(SpendCategory::from_label("hotel stay"), SpendCategory::Lodging);
        assert_eq!(SpendCategory::from_label("something else entirely"), SpendCategory::Other);
    }

    #[test]
    fn test_spend_category_from_decomposed_label() {
        // "COMBUSTI\u{301}VEIS" is the NFD spelling of "COMBUSTÍVEIS".
        assert_eq!(SpendCategory::from_label("COMBUSTI\u{301}VEIS"), SpendCategory::Fuel);
        assert_eq!(SpendCategory::from_label("Alimentac\u{327}a\u{303}o"), SpendCategory::Meals);
        assert_eq!(fold_label("Ac\u{327}a\u{301}i"), "acai");
    }

    #[test]
    fn test_postal_services_are_office() {
        assert_eq!(SpendCategory::from_label("SERVIÇOS POSTAIS"), SpendCategory::Office);
    }

    #[test]
    fn test_efficiency_rating_ordering() {
        assert!(EfficiencyRating::Excellent < EfficiencyRating::Good);
        assert!(EfficiencyRating::Poor < EfficiencyRating::Critical);
        assert_eq!(EfficiencyRating::default(), EfficiencyRating::Excellent);
        assert_eq!(EfficiencyRating::Moderate.tier(), 3);
    }

    #[test]
    fn test_severity_ordering_and_parse() {
        assert!(Severity::High < Severity::Low);
        assert_eq!("MEDIUM".parse::<Severity>().unwrap(), Severity::Medium);
    }
}
