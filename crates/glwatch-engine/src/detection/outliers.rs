use serde::Serialize;

use crate::detection::zscore::mean_std;
use crate::ledger::types::Transaction;

/// A single ledger line whose amount sits far from the ledger-wide mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionOutlier {
    pub gl_code: i64,
    pub amount: f64,
    pub zscore: f64,
    pub source_row: i64,
}

/// Per-transaction amount z-scores against the population mean and standard
/// deviation of every normalized amount. Rows with `|z| > threshold` are
/// returned, most extreme first; equal magnitudes keep input order.
///
/// Same degenerate policy as the group detector: no dispersion, no findings.
pub fn detect_transaction_outliers(
    transactions: &[Transaction],
    threshold: f64,
) -> Vec<TransactionOutlier> {
    let amounts = transactions
        .iter()
        .map(|row| row.amount)
        .collect::<Vec<f64>>();
    let Some(first) = amounts.first() else {
        return Vec::new();
    };
    if amounts.iter().all(|amount| amount == first) {
        return Vec::new();
    }

    let (mean, std_dev) = mean_std(&amounts);
    if std_dev <= 0.0 || !std_dev.is_finite() {
        return Vec::new();
    }

    let mut outliers = transactions
        .iter()
        .filter_map(|row| {
            let zscore = (row.amount - mean) / std_dev;
            (zscore.abs() > threshold).then_some(TransactionOutlier {
                gl_code: row.gl_code,
                amount: row.amount,
                zscore,
                source_row: row.source_row,
            })
        })
        .collect::<Vec<TransactionOutlier>>();
    outliers.sort_by(|left, right| right.zscore.abs().total_cmp(&left.zscore.abs()));
    outliers
}
