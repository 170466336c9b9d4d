use std::collections::BTreeSet;

use serde::Serialize;

use crate::detection::zscore::mean_std;
use crate::ledger::types::NormalizedLedger;

/// Descriptive statistics over the normalized ledger. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerStats {
    pub rows_read: i64,
    pub transactions: i64,
    pub rows_dropped: i64,
    pub distinct_gl_codes: i64,
    pub amount_total_positive: f64,
    pub amount_total_negative: f64,
    pub amount_mean: Option<f64>,
    pub amount_median: Option<f64>,
    pub amount_std_dev: Option<f64>,
    pub amount_variance: Option<f64>,
}

pub fn ledger_stats(ledger: &NormalizedLedger) -> LedgerStats {
    let transactions = &ledger.transactions;
    let distinct_gl_codes = transactions
        .iter()
        .map(|row| row.gl_code)
        .collect::<BTreeSet<i64>>()
        .len() as i64;

    let mut amounts = transactions
        .iter()
        .map(|row| row.amount)
        .collect::<Vec<f64>>();
    amounts.sort_by(|left, right| left.total_cmp(right));

    let (mean, std_dev) = if amounts.is_empty() {
        (None, None)
    } else {
        let (mean, std_dev) = mean_std(&amounts);
        (Some(mean), Some(std_dev))
    };

    LedgerStats {
        rows_read: ledger.rows_read,
        transactions: transactions.len() as i64,
        rows_dropped: ledger.dropped.total,
        distinct_gl_codes,
        amount_total_positive: transactions.iter().map(|row| row.positive_part()).sum(),
        amount_total_negative: transactions.iter().map(|row| row.negative_part()).sum(),
        amount_mean: mean,
        amount_median: median_f64(&amounts),
        amount_std_dev: std_dev,
        amount_variance: std_dev.map(|value| value * value),
    }
}

fn median_f64(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let middle = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        return Some((sorted[middle - 1] + sorted[middle]) / 2.0);
    }
    Some(sorted[middle])
}
