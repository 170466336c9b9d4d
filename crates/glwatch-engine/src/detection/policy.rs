use serde::{Deserialize, Serialize};

use crate::grouping::{GlRange, GroupAggregate};
use crate::{EngineError, EngineResult};

pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;
pub const DEFAULT_MIN_ABS_CHANGE: f64 = 10_000.0;
pub const DEFAULT_MIN_PCT_CHANGE: f64 = 20.0;
pub const DEFAULT_SIGN_RANGE_STEP: i64 = 10_000_000;

/// Numeric aggregate field the z-score detector measures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateField {
    #[default]
    Net,
    PositiveTotal,
    NegativeTotal,
    Count,
}

impl AggregateField {
    pub fn value_of(self, group: &GroupAggregate) -> f64 {
        match self {
            Self::Net => group.net,
            Self::PositiveTotal => group.positive_total,
            Self::NegativeTotal => group.negative_total,
            Self::Count => group.count as f64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Net => "net",
            Self::PositiveTotal => "positive_total",
            Self::NegativeTotal => "negative_total",
            Self::Count => "count",
        }
    }
}

/// How a range's expected sign is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignRule {
    #[default]
    Majority,
    Convention,
}

/// Runtime detection thresholds.
///
/// Every field has a default so partial JSON config files deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionPolicy {
    pub z_threshold: f64,
    pub zscore_field: AggregateField,
    pub min_abs_change: f64,
    pub min_pct_change: f64,
    pub sign_range_step: i64,
    pub sign_rule: SignRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_ranges: Option<Vec<GlRange>>,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
            zscore_field: AggregateField::Net,
            min_abs_change: DEFAULT_MIN_ABS_CHANGE,
            min_pct_change: DEFAULT_MIN_PCT_CHANGE,
            sign_range_step: DEFAULT_SIGN_RANGE_STEP,
            sign_rule: SignRule::Majority,
            sign_ranges: None,
        }
    }
}

impl DetectionPolicy {
    pub fn validate(&self) -> EngineResult<()> {
        validate_threshold("z_threshold", self.z_threshold)?;
        validate_threshold("min_abs_change", self.min_abs_change)?;
        validate_threshold("min_pct_change", self.min_pct_change)?;

        if self.sign_range_step <= 0 {
            return Err(EngineError::invalid_policy(&format!(
                "sign_range_step must be positive, got {}.",
                self.sign_range_step
            )));
        }

        if let Some(ranges) = &self.sign_ranges {
            validate_ranges(ranges)?;
        }

        Ok(())
    }
}

/// Explicit sign ranges must be non-empty intervals, ascending and disjoint.
pub fn validate_ranges(ranges: &[GlRange]) -> EngineResult<()> {
    for range in ranges {
        if range.lower >= range.upper {
            return Err(EngineError::invalid_policy(&format!(
                "Sign range {range} is empty; lower must be below upper."
            )));
        }
    }

    for pair in ranges.windows(2) {
        if pair[1].lower < pair[0].upper {
            return Err(EngineError::invalid_policy(&format!(
                "Sign ranges {} and {} overlap or are out of order.",
                pair[0], pair[1]
            )));
        }
    }

    Ok(())
}

fn validate_threshold(name: &str, value: f64) -> EngineResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::invalid_policy(&format!(
            "{name} must be a finite, non-negative number, got {value}."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::grouping::GlRange;

    use super::{DetectionPolicy, SignRule};

    #[test]
    fn defaults_match_documented_thresholds() {
        let policy = DetectionPolicy::default();
        assert_eq!(policy.z_threshold, 3.0);
        assert_eq!(policy.min_abs_change, 10_000.0);
        assert_eq!(policy.min_pct_change, 20.0);
        assert_eq!(policy.sign_range_step, 10_000_000);
        assert_eq!(policy.sign_rule, SignRule::Majority);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let parsed = serde_json::from_str::<DetectionPolicy>(
            r#"{"z_threshold": 2.5, "sign_rule": "convention"}"#,
        );
        assert!(parsed.is_ok());
        if let Ok(policy) = parsed {
            assert_eq!(policy.z_threshold, 2.5);
            assert_eq!(policy.sign_rule, SignRule::Convention);
            assert_eq!(policy.min_pct_change, 20.0);
        }
    }

    #[test]
    fn unknown_policy_keys_are_rejected() {
        let parsed = serde_json::from_str::<DetectionPolicy>(r#"{"z_treshold": 2.5}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn negative_or_non_finite_thresholds_fail_validation() {
        let negative = DetectionPolicy {
            min_abs_change: -1.0,
            ..DetectionPolicy::default()
        };
        assert!(negative.validate().is_err());

        let nan = DetectionPolicy {
            z_threshold: f64::NAN,
            ..DetectionPolicy::default()
        };
        assert!(nan.validate().is_err());

        let zero_step = DetectionPolicy {
            sign_range_step: 0,
            ..DetectionPolicy::default()
        };
        assert!(zero_step.validate().is_err());
    }

    #[test]
    fn overlapping_explicit_ranges_fail_validation() {
        let policy = DetectionPolicy {
            sign_ranges: Some(vec![
                GlRange {
                    lower: 0,
                    upper: 100,
                },
                GlRange {
                    lower: 50,
                    upper: 200,
                },
            ]),
            ..DetectionPolicy::default()
        };
        let validated = policy.validate();
        assert!(validated.is_err());
        if let Err(error) = validated {
            assert_eq!(error.code, "invalid_policy");
        }
    }
}
