use serde::Serialize;

use crate::detection::{
    ChangeFinding, LedgerStats, RangeSignSummary, SignAnalysis, SignFinding, TransactionOutlier,
    ZScoreFinding,
};
use crate::grouping::GroupingStrategy;
use crate::ledger::types::DroppedRows;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub zscore_count: i64,
    pub transaction_outlier_count: i64,
    /// Flagged change records only.
    pub change_count: i64,
    pub sign_count: i64,
    pub indeterminate_range_count: i64,
    pub compared_to_previous: bool,
    pub rows_read: i64,
    pub rows_dropped: i64,
    pub transactions: i64,
}

/// The engine's output contract: structured findings only, no prose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub grouping: GroupingStrategy,
    pub zscore_findings: Vec<ZScoreFinding>,
    pub transaction_findings: Vec<TransactionOutlier>,
    pub change_findings: Vec<ChangeFinding>,
    pub sign_findings: Vec<SignFinding>,
    pub sign_ranges: Vec<RangeSignSummary>,
    pub dropped_rows: DroppedRows,
    pub ledger: LedgerStats,
    pub summary: ReportSummary,
}

impl AnomalyReport {
    pub fn flagged_changes(&self) -> impl Iterator<Item = &ChangeFinding> {
        self.change_findings.iter().filter(|finding| finding.flagged)
    }

    pub fn total_findings(&self) -> i64 {
        self.summary.zscore_count
            + self.summary.transaction_outlier_count
            + self.summary.change_count
            + self.summary.sign_count
    }
}

pub struct ReportParts {
    pub grouping: GroupingStrategy,
    pub zscore: Vec<ZScoreFinding>,
    pub transaction_outliers: Vec<TransactionOutlier>,
    pub changes: Option<Vec<ChangeFinding>>,
    pub sign: SignAnalysis,
    pub dropped_rows: DroppedRows,
    pub ledger: LedgerStats,
}

/// Merges detector outputs into one report. Counts are derived from the
/// parts; nothing is recomputed.
pub fn build_report(parts: ReportParts) -> AnomalyReport {
    let compared_to_previous = parts.changes.is_some();
    let change_findings = parts.changes.unwrap_or_default();
    let summary = ReportSummary {
        zscore_count: parts.zscore.len() as i64,
        transaction_outlier_count: parts.transaction_outliers.len() as i64,
        change_count: change_findings.iter().filter(|row| row.flagged).count() as i64,
        sign_count: parts.sign.findings.len() as i64,
        indeterminate_range_count: parts.sign.indeterminate_count() as i64,
        compared_to_previous,
        rows_read: parts.ledger.rows_read,
        rows_dropped: parts.dropped_rows.total,
        transactions: parts.ledger.transactions,
    };

    AnomalyReport {
        grouping: parts.grouping,
        zscore_findings: parts.zscore,
        transaction_findings: parts.transaction_outliers,
        change_findings,
        sign_findings: parts.sign.findings,
        sign_ranges: parts.sign.ranges,
        dropped_rows: parts.dropped_rows,
        ledger: parts.ledger,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use crate::detection::{ChangeThresholds, SignAnalysis, detect_change_anomalies, ledger_stats};
    use crate::grouping::{Category, GroupAggregate, GroupKey, GroupingStrategy};
    use crate::ledger::normalize_rows;
    use crate::ledger::types::DroppedRows;

    use super::{ReportParts, build_report};

    fn group(category: Category, net: f64) -> GroupAggregate {
        let key = GroupKey::Category { category };
        GroupAggregate {
            group_key: key,
            label: key.label(),
            positive_total: net.max(0.0),
            negative_total: (-net).max(0.0),
            net,
            count: 1,
        }
    }

    #[test]
    fn change_count_only_counts_flagged_records() {
        let current = vec![group(Category::Assets, 50_000.0), group(Category::Equity, 10.0)];
        let previous = vec![group(Category::Assets, 0.0), group(Category::Equity, 10.0)];
        let changes = detect_change_anomalies(
            &current,
            &previous,
            ChangeThresholds {
                min_abs_change: 10_000.0,
                min_pct_change: 20.0,
            },
        );
        assert_eq!(changes.len(), 2);

        let report = build_report(ReportParts {
            grouping: GroupingStrategy::Category,
            zscore: Vec::new(),
            transaction_outliers: Vec::new(),
            changes: Some(changes),
            sign: SignAnalysis::default(),
            dropped_rows: DroppedRows::default(),
            ledger: ledger_stats(&normalize_rows(&[])),
        });
        assert_eq!(report.change_findings.len(), 2);
        assert_eq!(report.summary.change_count, 1);
        assert_eq!(report.flagged_changes().count(), 1);
        assert!(report.summary.compared_to_previous);
        assert_eq!(report.total_findings(), 1);
    }

    #[test]
    fn missing_previous_set_is_reported_as_not_compared() {
        let report = build_report(ReportParts {
            grouping: GroupingStrategy::Category,
            zscore: Vec::new(),
            transaction_outliers: Vec::new(),
            changes: None,
            sign: SignAnalysis::default(),
            dropped_rows: DroppedRows::default(),
            ledger: ledger_stats(&normalize_rows(&[])),
        });
        assert!(!report.summary.compared_to_previous);
        assert!(report.change_findings.is_empty());
        assert_eq!(report.summary.change_count, 0);
    }
}
