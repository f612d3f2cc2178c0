//! Red-flag heuristics over spend records and staffing

use chrono::NaiveDate;
use spendwatch_core::{
    ContentHash, RedFlag, RedFlagKind, RedFlagPolicy, Severity, SpendCategory, SpendRecord,
    StaffStats,
};
use std::collections::{BTreeMap, HashSet};

/// Drop records identical in every field, keeping the first occurrence.
pub fn dedupe_records(records: &[SpendRecord]) -> Vec<SpendRecord> {
    let mut seen: HashSet<ContentHash> = HashSet::with_capacity(records.len());
    records
        .iter()
        .filter(|r| seen.insert(r.fingerprint()))
        .cloned()
        .collect()
}

/// Drop exact-duplicate flags, keeping the first occurrence.
pub fn dedupe_flags(flags: Vec<RedFlag>) -> Vec<RedFlag> {
    let mut unique: Vec<RedFlag> = Vec::with_capacity(flags.len());
    for flag in flags {
        if !unique.contains(&flag) {
            unique.push(flag);
        }
    }
    unique
}

/// Run every heuristic and return the combined, de-duplicated flags.
///
/// Records are de-duplicated first. Callers must not rely on the order of
/// the returned flags.
pub fn generate_red_flags(
    records: &[SpendRecord],
    staff: &StaffStats,
    policy: &RedFlagPolicy,
) -> Vec<RedFlag> {
    let mut records = dedupe_records(records);
    // Fixed summation order keeps float totals independent of input order.
    records.sort_by_cached_key(|r| r.fingerprint());

    let mut flags = Vec::new();
    flags.extend(concentration_flags(&records, policy));
    flags.extend(outlier_flags(&records, policy));
    flags.extend(same_day_flags(&records, policy));
    flags.extend(staffing_flag(staff));

    dedupe_flags(flags)
}

fn concentration_flags(records: &[SpendRecord], policy: &RedFlagPolicy) -> Vec<RedFlag> {
    // Shares are compared in whole cents and basis points so a category at
    // exactly a threshold never lands above it through float rounding.
    let total_cents: i64 = records.iter().map(|r| to_cents(r.amount)).sum();
    if total_cents <= 0 {
        return Vec::new();
    }

    let mut by_category: BTreeMap<SpendCategory, i64> = BTreeMap::new();
    for record in records {
        *by_category.entry(record.category).or_insert(0) += to_cents(record.amount);
    }

    let exceeds = |spent_cents: i64, pct: f64| {
        i128::from(spent_cents) * 10_000 > i128::from(to_basis_points(pct)) * i128::from(total_cents)
    };

    policy
        .concentration
        .iter()
        .filter_map(|threshold| {
            let spent_cents = by_category.get(&threshold.category).copied()?;
            let severity = if exceeds(spent_cents, threshold.high_pct) {
                Severity::High
            } else if exceeds(spent_cents, threshold.medium_pct) {
                Severity::Medium
            } else {
                return None;
            };
            let spent = spent_cents as f64 / 100.0;
            let total = total_cents as f64 / 100.0;
            let share = spent_cents as f64 / total_cents as f64 * 100.0;
            let limit = match severity {
                Severity::High => threshold.high_pct,
                _ => threshold.medium_pct,
            };
            Some(
                RedFlag::new(
                    RedFlagKind::CategoryConcentration,
                    severity,
                    format!("{} spending concentration", threshold.category),
                )
                .with_detail(format!(
                    "{:.2}% of total spend ({:.2} of {:.2}) exceeds {}%",
                    share, spent, total, limit
                ))
                .with_category(threshold.category),
            )
        })
        .collect()
}

/// Amount rounded to whole cents.
fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Percentage rounded to hundredths of a percent.
fn to_basis_points(pct: f64) -> i64 {
    (pct * 100.0).round() as i64
}

fn outlier_flags(records: &[SpendRecord], policy: &RedFlagPolicy) -> Vec<RedFlag> {
    records
        .iter()
        .filter(|r| r.amount > policy.outlier_amount)
        .map(|r| {
            RedFlag::new(
                RedFlagKind::TransactionOutlier,
                policy.outlier_severity,
                format!("Single {} transaction above {:.2}", r.category, policy.outlier_amount),
            )
            .with_detail(format!(
                "{:.2} paid to {} on {} (record {})",
                r.amount,
                r.vendor,
                r.date,
                r.document_id.clone().unwrap_or_else(|| r.fingerprint_hex())
            ))
            .with_category(r.category)
            .with_source(r.source)
        })
        .collect()
}

fn same_day_flags(records: &[SpendRecord], policy: &RedFlagPolicy) -> Vec<RedFlag> {
    let mut groups: BTreeMap<(SpendCategory, NaiveDate), (usize, f64)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry((record.category, record.date)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += record.amount;
    }

    groups
        .into_iter()
        .filter(|(_, (count, sum))| *count > 1 && *sum > policy.same_day_amount)
        .map(|((category, date), (count, sum))| {
            RedFlag::new(
                RedFlagKind::SameDayCluster,
                Severity::Medium,
                format!("Multiple {} transactions on {}", category, date),
            )
            .with_detail(format!(
                "{} transactions totalling {:.2} exceed {:.2}",
                count, sum, policy.same_day_amount
            ))
            .with_category(category)
        })
        .collect()
}

fn staffing_flag(staff: &StaffStats) -> Option<RedFlag> {
    if !staff.at_ceiling() {
        return None;
    }
    let mut flag = RedFlag::new(
        RedFlagKind::StaffingAtCeiling,
        Severity::Low,
        "Staff headcount at the allowed maximum",
    )
    .with_detail(format!("{} of {} positions filled", staff.utilized_staff, staff.max_staff));
    if let Some(source) = staff.source {
        flag = flag.with_source(source);
    }
    Some(flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use spendwatch_core::SourceKind;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn record(category: SpendCategory, amount: f64, date: NaiveDate, doc: &str) -> SpendRecord {
        SpendRecord {
            date,
            category,
            amount,
            vendor: "Vendor".to_string(),
            document_id: Some(doc.to_string()),
            source: SourceKind::Chamber,
        }
    }

    fn kinds(flags: &[RedFlag], kind: RedFlagKind) -> Vec<&RedFlag> {
        flags.iter().filter(|f| f.kind == kind).collect()
    }

    #[test]
    fn test_fuel_share_exactly_at_high_threshold_is_not_high() {
        let records = vec![
            record(SpendCategory::Fuel, 250.0, day(1), "a"),
            record(SpendCategory::Office, 750.0, day(2), "b"),
        ];
        let flags = generate_red_flags(&records, &StaffStats::default(), &RedFlagPolicy::default());
        let concentration = kinds(&flags, RedFlagKind::CategoryConcentration);
        assert_eq!(concentration.len(), 1);
        assert_eq!(concentration[0].severity, Severity::Medium);
    }

    #[test]
    fn test_fuel_share_just_above_high_threshold_is_high() {
        let records = vec![
            record(SpendCategory::Fuel, 250.01, day(1), "a"),
            record(SpendCategory::Office, 749.99, day(2), "b"),
        ];
        let flags = generate_red_flags(&records, &StaffStats::default(), &RedFlagPolicy::default());
        let concentration = kinds(&flags, RedFlagKind::CategoryConcentration);
        assert_eq!(concentration.len(), 1);
        assert_eq!(concentration[0].severity, Severity::High);
        assert_eq!(concentration[0].spend_category, Some(SpendCategory::Fuel));
    }

    #[test]
    fn test_share_exactly_at_threshold_with_inexact_cents_is_not_high() {
        // 74.03 + 212.13 + 13.84 + 100.00 sums to 399.99999999999994 in f64.
        let records = vec![
            record(SpendCategory::Fuel, 100.0, day(1), "a"),
            record(SpendCategory::Office, 74.03, day(2), "b"),
            record(SpendCategory::Office, 212.13, day(3), "c"),
            record(SpendCategory::Office, 13.84, day(4), "d"),
        ];
        let flags = generate_red_flags(&records, &StaffStats::default(), &RedFlagPolicy::default());
        let fuel: Vec<&RedFlag> = kinds(&flags, RedFlagKind::CategoryConcentration)
            .into_iter()
            .filter(|f| f.spend_category == Some(SpendCategory::Fuel))
            .collect();
        assert_eq!(fuel.len(), 1);
        assert_eq!(fuel[0].severity, Severity::Medium);
    }

    #[test]
    fn test_one_cent_above_threshold_is_high() {
        let records = vec![
            record(SpendCategory::Fuel, 100.01, day(1), "a"),
            record(SpendCategory::Office, 74.02, day(2), "b"),
            record(SpendCategory::Office, 212.13, day(3), "c"),
            record(SpendCategory::Office, 13.84, day(4), "d"),
        ];
        let flags = generate_red_flags(&records, &StaffStats::default(), &RedFlagPolicy::default());
        let fuel: Vec<&RedFlag> = kinds(&flags, RedFlagKind::CategoryConcentration)
            .into_iter()
            .filter(|f| f.spend_category == Some(SpendCategory::Fuel))
            .collect();
        assert_eq!(fuel[0].severity, Severity::High);
    }

    #[test]
    fn test_share_at_medium_threshold_is_not_flagged() {
        let records = vec![
            record(SpendCategory::Fuel, 150.0, day(1), "a"),
            record(SpendCategory::Office, 850.0, day(2), "b"),
        ];
        let flags = generate_red_flags(&records, &StaffStats::default(), &RedFlagPolicy::default());
        assert!(kinds(&flags, RedFlagKind::CategoryConcentration).is_empty());
    }

    #[test]
    fn test_outlier_is_strictly_above_amount() {
        let records = vec![
            record(SpendCategory::Office, 10_000.0, day(1), "a"),
            record(SpendCategory::Office, 10_000.01, day(2), "b"),
        ];
        let flags = generate_red_flags(&records, &StaffStats::default(), &RedFlagPolicy::default());
        let outliers = kinds(&flags, RedFlagKind::TransactionOutlier);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].severity, Severity::High);
        assert_eq!(outliers[0].source, Some(SourceKind::Chamber));
    }

    #[test]
    fn test_outlier_severity_follows_policy() {
        let records = vec![record(SpendCategory::Office, 20_000.0, day(1), "a")];
        let policy = RedFlagPolicy::default().with_outlier_severity(Severity::Medium);
        let flags = generate_red_flags(&records, &StaffStats::default(), &policy);
        assert_eq!(kinds(&flags, RedFlagKind::TransactionOutlier)[0].severity, Severity::Medium);
    }

    #[test]
    fn test_same_day_cluster_one_flag_per_group() {
        let records = vec![
            record(SpendCategory::Meals, 3_000.0, day(3), "a"),
            record(SpendCategory::Meals, 2_500.0, day(3), "b"),
            record(SpendCategory::Meals, 100.0, day(3), "c"),
            record(SpendCategory::Meals, 9_000.0, day(4), "d"),
        ];
        let flags = generate_red_flags(&records, &StaffStats::default(), &RedFlagPolicy::default());
        let clusters = kinds(&flags, RedFlagKind::SameDayCluster);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].severity, Severity::Medium);
        assert!(clusters[0].description.contains("2024-06-03"));
    }

    #[test]
    fn test_same_day_cluster_ignores_exact_duplicates() {
        let dup = record(SpendCategory::Travel, 3_000.0, day(5), "same");
        let records = vec![dup.clone(), dup];
        let flags = generate_red_flags(&records, &StaffStats::default(), &RedFlagPolicy::default());
        assert!(kinds(&flags, RedFlagKind::SameDayCluster).is_empty());
    }

    #[test]
    fn test_same_day_cluster_requires_amount_above_threshold() {
        let records = vec![
            record(SpendCategory::Travel, 2_500.0, day(5), "a"),
            record(SpendCategory::Travel, 2_500.0, day(5), "b"),
        ];
        let flags = generate_red_flags(&records, &StaffStats::default(), &RedFlagPolicy::default());
        assert!(kinds(&flags, RedFlagKind::SameDayCluster).is_empty());
    }

    #[test]
    fn test_staffing_at_ceiling() {
        let policy = RedFlagPolicy::default();
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

        let flags = generate_red_flags(&[], &full, &policy);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].kind, RedFlagKind::StaffingAtCeiling);
        assert_eq!(flags[0].severity, Severity::Low);

        assert!(generate_red_flags(&[], &under, &policy).is_empty());
        assert!(generate_red_flags(&[], &StaffStats::default(), &policy).is_empty());
    }

    #[test]
    fn test_dedupe_flags_removes_only_exact_duplicates() {
        let a = RedFlag::new(RedFlagKind::TransactionOutlier, Severity::High, "x");
        let b = a.clone().with_detail("different");
        let flags = dedupe_flags(vec![a.clone(), a, b]);
        assert_eq!(flags.len(), 2);
    }

    fn arb_record() -> impl Strategy<Value = SpendRecord> {
        (
            prop::sample::select(vec![
                SpendCategory::Fuel,
                SpendCategory::Travel,
                SpendCategory::Meals,
                SpendCategory::Office,
            ]),
            0.0f64..20_000.0,
            1u32..28,
            "[a-z]{1,6}",
        )
            .prop_map(|(category, amount, d, doc)| record(category, amount, day(d), &doc))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Input order never changes the set of flags produced.
        #[test]
        fn prop_flags_are_order_insensitive(records in prop::collection::vec(arb_record(), 0..12)) {
            let policy = RedFlagPolicy::default();
            let staff = StaffStats::default();
            let forward = generate_red_flags(&records, &staff, &policy);
            let mut reversed_input = records.clone();
            reversed_input.reverse();
            let backward = generate_red_flags(&reversed_input, &staff, &policy);

            prop_assert_eq!(forward.len(), backward.len());
            for flag in &forward {
                prop_assert!(backward.contains(flag));
            }
        }

        /// Output never contains two identical flags.
        #[test]
        fn prop_no_duplicate_flags(records in prop::collection::vec(arb_record(), 0..12)) {
            let mut doubled = records.clone();
            doubled.extend(records);
            let flags = generate_red_flags(&doubled, &StaffStats::default(), &RedFlagPolicy::default());
            for (i, flag) in flags.iter().enumerate() {
                prop_assert!(!flags[i + 1..].contains(flag));
            }
        }
    }
}
