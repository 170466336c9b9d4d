use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::detection::{
    ChangeThresholds, default_sign_ranges, detect_change_anomalies, detect_sign_anomalies,
    detect_transaction_outliers, detect_zscore_anomalies, ledger_stats,
};
use crate::grouping::{GroupAggregate, GroupKey, GroupingStrategy, aggregate};
use crate::ledger::types::RawGlRow;
use crate::ledger::{normalize_rows, parse_frame};
use crate::report::{AnomalyReport, ReportParts, build_report};
use crate::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub report: AnomalyReport,
    /// Current-period aggregates; what a snapshot store persists for the
    /// next run's comparison.
    pub aggregates: Vec<GroupAggregate>,
}

/// Parses a raw frame and runs the full detection pipeline over it.
pub fn analyze_frame(
    content: &str,
    config: &AnalysisConfig,
    previous: Option<&[GroupAggregate]>,
) -> EngineResult<AnalysisOutcome> {
    config.validate()?;
    let rows = parse_frame(content, &config.columns)?;
    analyze_rows(&rows, config, previous)
}

/// Normalize, aggregate, run every detector and merge their findings.
///
/// Pure: identical rows, config and previous set give an identical outcome.
pub fn analyze_rows(
    rows: &[RawGlRow],
    config: &AnalysisConfig,
    previous: Option<&[GroupAggregate]>,
) -> EngineResult<AnalysisOutcome> {
    config.validate()?;
    if let Some(previous_groups) = previous {
        ensure_comparable(&config.grouping, previous_groups)?;
    }

    let policy = &config.policy;
    let ledger = normalize_rows(rows);
    let aggregates = aggregate(&ledger.transactions, &config.grouping);

    let zscore = detect_zscore_anomalies(&aggregates, policy.zscore_field, policy.z_threshold);
    let transaction_outliers =
        detect_transaction_outliers(&ledger.transactions, policy.z_threshold);
    let changes = previous.map(|previous_groups| {
        detect_change_anomalies(
            &aggregates,
            previous_groups,
            ChangeThresholds {
                min_abs_change: policy.min_abs_change,
                min_pct_change: policy.min_pct_change,
            },
        )
    });

    let ranges = match &policy.sign_ranges {
        Some(explicit) => explicit.clone(),
        None => default_sign_ranges(&ledger.transactions, policy.sign_range_step),
    };
    debug!(ranges = ranges.len(), rule = ?policy.sign_rule, "checking sign conventions");
    let sign = detect_sign_anomalies(&ledger.transactions, &ranges, policy.sign_rule);

    let report = build_report(ReportParts {
        grouping: config.grouping,
        zscore,
        transaction_outliers,
        changes,
        sign,
        dropped_rows: ledger.dropped.clone(),
        ledger: ledger_stats(&ledger),
    });

    info!(
        transactions = report.summary.transactions,
        dropped = report.summary.rows_dropped,
        groups = aggregates.len(),
        zscore = report.summary.zscore_count,
        outliers = report.summary.transaction_outlier_count,
        changes = report.summary.change_count,
        sign = report.summary.sign_count,
        "analysis complete"
    );

    Ok(AnalysisOutcome { report, aggregates })
}

/// A previous set must come from the same grouping: same key kind and, for
/// ranges, keys this grouping would itself produce for their lower bound.
pub fn ensure_comparable(
    grouping: &GroupingStrategy,
    previous: &[GroupAggregate],
) -> EngineResult<()> {
    for group in previous {
        let compatible = match (grouping, group.group_key) {
            (GroupingStrategy::Category, GroupKey::Category { .. }) => true,
            (GroupingStrategy::Range { .. }, GroupKey::Range { lower, .. }) => {
                grouping.group_key(lower) == group.group_key
            }
            _ => false,
        };
        if !compatible {
            let previous_kind = match group.group_key {
                GroupKey::Category { .. } => "category".to_string(),
                GroupKey::Range { lower, upper } => {
                    format!("range(step={})", upper.saturating_sub(lower))
                }
            };
            return Err(EngineError::snapshot_strategy_mismatch(
                &grouping.describe(),
                &previous_kind,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::AnalysisConfig;
    use crate::grouping::{GroupingStrategy, aggregate};
    use crate::ledger::normalize_rows;
    use crate::ledger::types::RawGlRow;

    use super::{analyze_frame, analyze_rows, ensure_comparable};

    #[test]
    fn missing_columns_fail_before_any_work() {
        let outcome = analyze_frame("Account,Value\n1,2\n", &AnalysisConfig::default(), None);
        assert!(outcome.is_err());
        if let Err(error) = outcome {
            assert_eq!(error.code, "missing_required_columns");
        }
    }

    #[test]
    fn range_previous_set_cannot_feed_category_run() {
        let rows = vec![RawGlRow::new(1, Some("11000000"), Some("5"))];
        let previous = aggregate(
            &normalize_rows(&rows).transactions,
            &GroupingStrategy::Range { step: 10_000_000 },
        );
        let outcome = analyze_rows(&rows, &AnalysisConfig::default(), Some(&previous));
        assert!(outcome.is_err());
        if let Err(error) = outcome {
            assert_eq!(error.code, "snapshot_strategy_mismatch");
        }

        let other_width = ensure_comparable(&GroupingStrategy::Range { step: 1_000 }, &previous);
        assert!(other_width.is_err());
        let same_width =
            ensure_comparable(&GroupingStrategy::Range { step: 10_000_000 }, &previous);
        assert!(same_width.is_ok());
    }

    #[test]
    fn saturated_top_range_matches_its_own_grouping() {
        let grouping = GroupingStrategy::Range { step: 10_000_000 };
        let rows = vec![
            RawGlRow::new(1, Some("9223372036854775800"), Some("5")),
            RawGlRow::new(2, Some("11000000"), Some("5")),
        ];
        let previous = aggregate(&normalize_rows(&rows).transactions, &grouping);
        assert_eq!(previous.len(), 2);
        assert!(ensure_comparable(&grouping, &previous).is_ok());

        let mut config = AnalysisConfig::default();
        config.grouping = grouping;
        let outcome = analyze_rows(&rows, &config, Some(&previous));
        assert!(outcome.is_ok());
        if let Ok(result) = outcome {
            assert!(result.report.summary.compared_to_previous);
            assert_eq!(result.report.summary.change_count, 0);
        }

        let shifted = ensure_comparable(&GroupingStrategy::Range { step: 7 }, &previous);
        assert!(shifted.is_err());
    }

    #[test]
    fn empty_frame_produces_empty_report() {
        let outcome = analyze_frame("GL,Amount\n", &AnalysisConfig::default(), Some(&[]));
        assert!(outcome.is_ok());
        if let Ok(result) = outcome {
            assert!(result.aggregates.is_empty());
            assert!(result.report.zscore_findings.is_empty());
            assert!(result.report.transaction_findings.is_empty());
            assert!(result.report.change_findings.is_empty());
            assert!(result.report.sign_findings.is_empty());
            assert!(result.report.sign_ranges.is_empty());
            assert!(result.report.summary.compared_to_previous);
        }
    }
}
