use std::collections::BTreeSet;

use serde::Serialize;

use crate::detection::policy::SignRule;
use crate::grouping::{Category, GlRange};
use crate::ledger::types::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    fn of(amount: f64) -> Option<Self> {
        if amount > 0.0 {
            Some(Self::Positive)
        } else if amount < 0.0 {
            Some(Self::Negative)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

/// Where a range's expected sign came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignBasis {
    Majority,
    Convention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSignStatus {
    NoEntries,
    Unsigned,
    Consistent,
    Anomalous,
    Indeterminate,
}

impl RangeSignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoEntries => "no_entries",
            Self::Unsigned => "unsigned",
            Self::Consistent => "consistent",
            Self::Anomalous => "anomalous",
            Self::Indeterminate => "indeterminate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignFinding {
    pub range: GlRange,
    pub range_label: String,
    pub expected_sign: Sign,
    pub basis: SignBasis,
    pub gl_code: i64,
    pub amount: f64,
    pub source_row: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeSignSummary {
    pub range: GlRange,
    pub label: String,
    pub positive_count: i64,
    pub negative_count: i64,
    pub zero_count: i64,
    pub expected_sign: Option<Sign>,
    pub basis: Option<SignBasis>,
    pub status: RangeSignStatus,
    pub fault_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignAnalysis {
    pub findings: Vec<SignFinding>,
    pub ranges: Vec<RangeSignSummary>,
}

impl SignAnalysis {
    pub fn indeterminate_count(&self) -> usize {
        self.ranges
            .iter()
            .filter(|range| range.status == RangeSignStatus::Indeterminate)
            .count()
    }
}

/// Sign ranges of width `step` starting at `step` itself. Codes below one
/// step fall outside every range.
///
/// Only steps holding at least one transaction become their own range. Each
/// run of empty steps between them collapses into a single range, so the
/// range count is bounded by the transaction count rather than by the size of
/// the largest GL code.
pub fn default_sign_ranges(transactions: &[Transaction], step: i64) -> Vec<GlRange> {
    if step <= 0 {
        return Vec::new();
    }

    let occupied = transactions
        .iter()
        .filter(|row| row.gl_code >= step)
        .map(|row| row.gl_code.div_euclid(step).saturating_mul(step))
        .collect::<BTreeSet<i64>>();

    let mut ranges = Vec::with_capacity(occupied.len() * 2);
    let mut cursor = step;
    for lower in occupied {
        if lower > cursor {
            ranges.push(GlRange {
                lower: cursor,
                upper: lower,
            });
        }
        let upper = lower.saturating_add(step);
        ranges.push(GlRange { lower, upper });
        cursor = upper;
    }
    ranges
}

/// Conventional expected sign for a category, if it has one.
pub fn conventional_sign(category: Category) -> Option<Sign> {
    match category {
        Category::Assets
        | Category::Liabilities
        | Category::Expenses
        | Category::CostOfGoodsSold
        | Category::OtherExpenses => Some(Sign::Positive),
        Category::Equity | Category::Revenue | Category::OtherIncome => Some(Sign::Negative),
        Category::Adjustments | Category::Unknown => None,
    }
}

/// Flags individual transactions whose sign disagrees with their range's
/// expected sign.
///
/// `ranges` must be ascending and disjoint. Works on raw transactions, not on
/// group totals, so a range whose net has the expected sign still surfaces
/// its individual opposite-sign entries.
pub fn detect_sign_anomalies(
    transactions: &[Transaction],
    ranges: &[GlRange],
    rule: SignRule,
) -> SignAnalysis {
    let mut members: Vec<Vec<&Transaction>> = vec![Vec::new(); ranges.len()];
    for transaction in transactions {
        if let Some(index) = range_index(ranges, transaction.gl_code) {
            members[index].push(transaction);
        }
    }

    let mut analysis = SignAnalysis::default();
    for (range, rows) in ranges.iter().zip(members) {
        let positive_count = count_sign(&rows, Sign::Positive);
        let negative_count = count_sign(&rows, Sign::Negative);
        let zero_count = rows.len() as i64 - positive_count - negative_count;

        let mut summary = RangeSignSummary {
            range: *range,
            label: range.label(),
            positive_count,
            negative_count,
            zero_count,
            expected_sign: None,
            basis: None,
            status: RangeSignStatus::NoEntries,
            fault_count: 0,
        };

        if rows.is_empty() {
            analysis.ranges.push(summary);
            continue;
        }
        if positive_count + negative_count == 0 {
            summary.status = RangeSignStatus::Unsigned;
            analysis.ranges.push(summary);
            continue;
        }

        let Some((expected, basis)) = expected_sign(range, rule, positive_count, negative_count)
        else {
            summary.status = RangeSignStatus::Indeterminate;
            analysis.ranges.push(summary);
            continue;
        };

        let faults = rows
            .iter()
            .filter(|row| Sign::of(row.amount).is_some_and(|sign| sign != expected))
            .map(|row| SignFinding {
                range: *range,
                range_label: range.label(),
                expected_sign: expected,
                basis,
                gl_code: row.gl_code,
                amount: row.amount,
                source_row: row.source_row,
            })
            .collect::<Vec<SignFinding>>();

        summary.expected_sign = Some(expected);
        summary.basis = Some(basis);
        summary.fault_count = faults.len() as i64;
        summary.status = if faults.is_empty() {
            RangeSignStatus::Consistent
        } else {
            RangeSignStatus::Anomalous
        };
        analysis.ranges.push(summary);
        analysis.findings.extend(faults);
    }

    analysis
}

fn expected_sign(
    range: &GlRange,
    rule: SignRule,
    positive_count: i64,
    negative_count: i64,
) -> Option<(Sign, SignBasis)> {
    if rule == SignRule::Convention
        && let Some(sign) = conventional_sign(Category::from_gl_code(range.lower))
    {
        return Some((sign, SignBasis::Convention));
    }

    // Strict majority of signed entries; an exact tie has no expected sign.
    match positive_count.cmp(&negative_count) {
        std::cmp::Ordering::Greater => Some((Sign::Positive, SignBasis::Majority)),
        std::cmp::Ordering::Less => Some((Sign::Negative, SignBasis::Majority)),
        std::cmp::Ordering::Equal => None,
    }
}

fn range_index(ranges: &[GlRange], gl_code: i64) -> Option<usize> {
    let candidate = ranges.partition_point(|range| range.upper <= gl_code);
    ranges
        .get(candidate)
        .filter(|range| range.contains(gl_code))
        .map(|_| candidate)
}

fn count_sign(rows: &[&Transaction], sign: Sign) -> i64 {
    rows.iter()
        .filter(|row| Sign::of(row.amount) == Some(sign))
        .count() as i64
}

#[cfg(test)]
mod tests {
    use crate::detection::policy::SignRule;
    use crate::grouping::GlRange;
    use crate::ledger::types::Transaction;

    use super::{
        RangeSignStatus, Sign, SignBasis, default_sign_ranges, detect_sign_anomalies,
    };

    fn txn(gl_code: i64, amount: f64, source_row: i64) -> Transaction {
        Transaction {
            gl_code,
            amount,
            source_row,
        }
    }

    const STEP: i64 = 10_000_000;

    #[test]
    fn majority_positive_range_flags_the_single_negative_entry() {
        let rows = vec![
            txn(11_000_001, 100.0, 1),
            txn(11_000_002, 50.0, 2),
            txn(11_000_003, -30.0, 3),
        ];
        let ranges = default_sign_ranges(&rows, STEP);
        let analysis = detect_sign_anomalies(&rows, &ranges, SignRule::Majority);

        assert_eq!(analysis.findings.len(), 1);
        let finding = &analysis.findings[0];
        assert_eq!(finding.gl_code, 11_000_003);
        assert_eq!(finding.amount, -30.0);
        assert_eq!(finding.expected_sign, Sign::Positive);
        assert_eq!(finding.basis, SignBasis::Majority);
        assert_eq!(analysis.ranges[0].status, RangeSignStatus::Anomalous);
        assert_eq!(analysis.ranges[0].fault_count, 1);
    }

    #[test]
    fn default_ranges_start_at_one_step_and_collapse_empty_steps() {
        let rows = vec![txn(5, 1.0, 1), txn(35_000_000, 1.0, 2)];
        let ranges = default_sign_ranges(&rows, STEP);
        assert_eq!(
            ranges,
            vec![
                GlRange {
                    lower: 10_000_000,
                    upper: 30_000_000,
                },
                GlRange {
                    lower: 30_000_000,
                    upper: 40_000_000,
                },
            ]
        );

        let analysis = detect_sign_anomalies(&rows, &ranges, SignRule::Majority);
        assert_eq!(analysis.ranges[0].status, RangeSignStatus::NoEntries);
        assert_eq!(analysis.ranges[0].label, "[10000000, 30000000)");
        assert_eq!(analysis.ranges[1].status, RangeSignStatus::Consistent);
        assert!(analysis.findings.is_empty());
        assert!(default_sign_ranges(&[], STEP).is_empty());
        assert!(default_sign_ranges(&[txn(5, 1.0, 1)], STEP).is_empty());
    }

    #[test]
    fn huge_gl_code_keeps_range_count_small() {
        let rows = vec![
            txn(11_000_000, 5.0, 1),
            txn(11_000_001, -2.0, 2),
            txn(11_000_002, 3.0, 3),
            txn(9_000_000_000_000_000_000, 5.0, 4),
        ];
        let ranges = default_sign_ranges(&rows, STEP);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[1].lower, 20_000_000);
        assert_eq!(ranges[1].upper, 9_000_000_000_000_000_000);
        assert_eq!(ranges[2].lower, 9_000_000_000_000_000_000);

        let analysis = detect_sign_anomalies(&rows, &ranges, SignRule::Majority);
        assert_eq!(analysis.ranges.len(), 3);
        assert_eq!(analysis.ranges[1].status, RangeSignStatus::NoEntries);
        assert_eq!(analysis.ranges[2].status, RangeSignStatus::Consistent);
        assert_eq!(analysis.findings.len(), 1);
        assert_eq!(analysis.findings[0].source_row, 2);
    }

    #[test]
    fn adjacent_occupied_steps_leave_no_gap_range() {
        let rows = vec![txn(10_000_000, 1.0, 1), txn(29_999_999, -1.0, 2)];
        let ranges = default_sign_ranges(&rows, STEP);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].upper, ranges[1].lower);
    }

    #[test]
    fn exact_tie_is_indeterminate_with_no_findings() {
        let rows = vec![txn(12_000_000, 10.0, 1), txn(12_000_001, -10.0, 2)];
        let ranges = default_sign_ranges(&rows, STEP);
        let analysis = detect_sign_anomalies(&rows, &ranges, SignRule::Majority);
        assert!(analysis.findings.is_empty());
        assert_eq!(analysis.ranges[0].status, RangeSignStatus::Indeterminate);
        assert_eq!(analysis.ranges[0].expected_sign, None);
        assert_eq!(analysis.indeterminate_count(), 1);
    }

    #[test]
    fn zero_amounts_carry_no_sign() {
        let rows = vec![
            txn(12_000_000, 0.0, 1),
            txn(22_000_000, 0.0, 2),
            txn(22_000_001, -4.0, 3),
        ];
        let ranges = default_sign_ranges(&rows, STEP);
        let analysis = detect_sign_anomalies(&rows, &ranges, SignRule::Majority);
        assert_eq!(analysis.ranges[0].status, RangeSignStatus::Unsigned);
        assert_eq!(analysis.ranges[0].zero_count, 1);
        assert_eq!(analysis.ranges[1].status, RangeSignStatus::Consistent);
        assert_eq!(analysis.ranges[1].expected_sign, Some(Sign::Negative));
        assert!(analysis.findings.is_empty());
    }

    #[test]
    fn convention_rule_overrides_majority_where_category_has_one() {
        // Revenue range expects negative even though positives dominate.
        let rows = vec![
            txn(41_000_000, 10.0, 1),
            txn(41_000_001, 20.0, 2),
            txn(41_000_002, -5.0, 3),
            txn(91_000_000, 1.0, 4),
            txn(91_000_001, 1.0, 5),
            txn(91_000_002, -1.0, 6),
        ];
        let ranges = default_sign_ranges(&rows, STEP);
        let analysis = detect_sign_anomalies(&rows, &ranges, SignRule::Convention);

        let revenue = analysis
            .findings
            .iter()
            .filter(|finding| finding.range.lower == 40_000_000)
            .collect::<Vec<_>>();
        assert_eq!(revenue.len(), 2);
        assert!(revenue.iter().all(|finding| finding.basis == SignBasis::Convention));
        assert!(revenue.iter().all(|finding| finding.expected_sign == Sign::Negative));

        // Adjustments have no convention and fall back to majority.
        let adjustments = analysis
            .findings
            .iter()
            .filter(|finding| finding.range.lower == 90_000_000)
            .collect::<Vec<_>>();
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].source_row, 6);
        assert_eq!(adjustments[0].basis, SignBasis::Majority);
    }

    #[test]
    fn explicit_ranges_skip_codes_in_gaps() {
        let ranges = vec![
            GlRange {
                lower: 100,
                upper: 200,
            },
            GlRange {
                lower: 300,
                upper: 400,
            },
        ];
        let rows = vec![
            txn(150, 1.0, 1),
            txn(250, -1.0, 2),
            txn(399, -1.0, 3),
            txn(400, -1.0, 4),
        ];
        let analysis = detect_sign_anomalies(&rows, &ranges, SignRule::Majority);
        assert_eq!(analysis.ranges[0].positive_count, 1);
        assert_eq!(analysis.ranges[1].negative_count, 1);
        assert_eq!(analysis.ranges[1].positive_count, 0);
    }
}
