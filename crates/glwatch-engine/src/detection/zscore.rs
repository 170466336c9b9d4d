use serde::Serialize;

use crate::detection::policy::AggregateField;
use crate::grouping::{GroupAggregate, GroupKey};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZScoreFinding {
    pub group_key: GroupKey,
    pub label: String,
    pub field: AggregateField,
    pub value: f64,
    pub net: f64,
    pub zscore: f64,
}

/// Flags groups whose selected field lies more than `threshold` population
/// standard deviations from the cross-group mean, most extreme first.
///
/// A set without dispersion (a single group, or all values equal) yields no
/// findings for any threshold.
pub fn detect_zscore_anomalies(
    aggregates: &[GroupAggregate],
    field: AggregateField,
    threshold: f64,
) -> Vec<ZScoreFinding> {
    let values = aggregates
        .iter()
        .map(|group| field.value_of(group))
        .collect::<Vec<f64>>();
    if !has_dispersion(&values) {
        return Vec::new();
    }

    let (mean, std_dev) = mean_std(&values);
    if std_dev <= 0.0 || !std_dev.is_finite() {
        return Vec::new();
    }

    let mut findings = aggregates
        .iter()
        .zip(values)
        .filter_map(|(group, value)| {
            let zscore = (value - mean) / std_dev;
            if zscore.abs() <= threshold {
                return None;
            }
            Some(ZScoreFinding {
                group_key: group.group_key,
                label: group.label.clone(),
                field,
                value,
                net: group.net,
                zscore,
            })
        })
        .collect::<Vec<ZScoreFinding>>();

    // Stable: equal magnitudes keep aggregate order.
    findings.sort_by(|left, right| right.zscore.abs().total_cmp(&left.zscore.abs()));
    findings
}

/// Population mean and standard deviation (denominator N).
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn has_dispersion(values: &[f64]) -> bool {
    let Some(first) = values.first() else {
        return false;
    };
    values.iter().any(|value| value != first)
}
