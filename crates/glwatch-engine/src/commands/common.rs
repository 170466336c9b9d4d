use std::path::Path;

use crate::config::AnalysisConfig;
use crate::contracts::types::SourceInfo;
use crate::detection::{AggregateField, SignRule};
use crate::grouping::GroupingStrategy;
use crate::ledger::input::ResolvedSource;
use crate::{EngineError, EngineResult};

pub const DEFAULT_RANGE_STEP: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingChoice {
    Category,
    Range,
}

/// Command-line overrides layered over a config file (or the defaults).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub grouping: Option<GroupingChoice>,
    pub step: Option<i64>,
    pub z_threshold: Option<f64>,
    pub zscore_field: Option<AggregateField>,
    pub min_abs_change: Option<f64>,
    pub min_pct_change: Option<f64>,
    pub sign_step: Option<i64>,
    pub sign_rule: Option<SignRule>,
    pub gl_column: Option<String>,
    pub amount_column: Option<String>,
}

pub(crate) fn resolve_config(
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
    command: &str,
) -> EngineResult<AnalysisConfig> {
    let mut config = match config_path {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };

    config.grouping = match (overrides.grouping, overrides.step) {
        (Some(GroupingChoice::Category), Some(_)) => {
            return Err(EngineError::invalid_argument_for_command(
                "`--step` only applies to range grouping.",
                Some(command),
            ));
        }
        (Some(GroupingChoice::Category), None) => GroupingStrategy::Category,
        (Some(GroupingChoice::Range), step) => GroupingStrategy::Range {
            step: step.unwrap_or(match config.grouping {
                GroupingStrategy::Range { step } => step,
                GroupingStrategy::Category => DEFAULT_RANGE_STEP,
            }),
        },
        (None, Some(step)) => match config.grouping {
            GroupingStrategy::Range { .. } => GroupingStrategy::Range { step },
            GroupingStrategy::Category => {
                return Err(EngineError::invalid_argument_for_command(
                    "`--step` requires `--grouping range`.",
                    Some(command),
                ));
            }
        },
        (None, None) => config.grouping,
    };

    let policy = &mut config.policy;
    if let Some(value) = overrides.z_threshold {
        policy.z_threshold = value;
    }
    if let Some(value) = overrides.zscore_field {
        policy.zscore_field = value;
    }
    if let Some(value) = overrides.min_abs_change {
        policy.min_abs_change = value;
    }
    if let Some(value) = overrides.min_pct_change {
        policy.min_pct_change = value;
    }
    if let Some(value) = overrides.sign_step {
        policy.sign_range_step = value;
    }
    if let Some(value) = overrides.sign_rule {
        policy.sign_rule = value;
    }
    if let Some(value) = &overrides.gl_column {
        config.columns.gl_column = value.clone();
    }
    if let Some(value) = &overrides.amount_column {
        config.columns.amount_column = value.clone();
    }

    config.validate()?;
    Ok(config)
}

pub(crate) fn source_info(source: &ResolvedSource) -> SourceInfo {
    SourceInfo {
        kind: source.source_kind.as_str().to_string(),
        reference: source.source_ref.clone(),
    }
}

#[cfg(test)]
mod tests {
    use crate::detection::{AggregateField, SignRule};
    use crate::grouping::GroupingStrategy;

    use super::{ConfigOverrides, DEFAULT_RANGE_STEP, GroupingChoice, resolve_config};

    #[test]
    fn range_grouping_without_step_uses_default_width() {
        let overrides = ConfigOverrides {
            grouping: Some(GroupingChoice::Range),
            ..ConfigOverrides::default()
        };
        let config = resolve_config(None, &overrides, "analyze");
        assert!(config.is_ok());
        if let Ok(value) = config {
            assert_eq!(
                value.grouping,
                GroupingStrategy::Range {
                    step: DEFAULT_RANGE_STEP
                }
            );
        }
    }

    #[test]
    fn step_without_range_grouping_is_rejected() {
        let overrides = ConfigOverrides {
            step: Some(1_000),
            ..ConfigOverrides::default()
        };
        let config = resolve_config(None, &overrides, "analyze");
        assert!(config.is_err());
        if let Err(error) = config {
            assert_eq!(error.code, "invalid_argument");
        }
    }

    #[test]
    fn flag_overrides_layer_over_config_file() {
        let temp = tempfile::tempdir();
        assert!(temp.is_ok());
        let Ok(dir) = temp else { return };
        let path = dir.path().join("glwatch.json");
        let body = r#"{"grouping": {"kind": "range", "step": 500}, "policy": {"z_threshold": 2.0}}"#;
        assert!(std::fs::write(&path, body).is_ok());

        let overrides = ConfigOverrides {
            step: Some(1_000),
            zscore_field: Some(AggregateField::Count),
            sign_rule: Some(SignRule::Convention),
            amount_column: Some("Value".to_string()),
            ..ConfigOverrides::default()
        };
        let config = resolve_config(Some(&path), &overrides, "analyze");
        assert!(config.is_ok());
        if let Ok(value) = config {
            assert_eq!(value.grouping, GroupingStrategy::Range { step: 1_000 });
            assert_eq!(value.policy.z_threshold, 2.0);
            assert_eq!(value.policy.zscore_field, AggregateField::Count);
            assert_eq!(value.policy.sign_rule, SignRule::Convention);
            assert_eq!(value.columns.amount_column, "Value");
            assert_eq!(value.columns.gl_column, "GL");
        }
    }

    #[test]
    fn negative_threshold_override_is_invalid_policy() {
        let overrides = ConfigOverrides {
            min_abs_change: Some(-1.0),
            ..ConfigOverrides::default()
        };
        let config = resolve_config(None, &overrides, "analyze");
        assert!(matches!(config, Err(ref error) if error.code == "invalid_policy"));
    }
}
