use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detection::DetectionPolicy;
use crate::grouping::GroupingStrategy;
use crate::ledger::types::ColumnMapping;
use crate::{EngineError, EngineResult};

/// Everything a caller may tune for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub columns: ColumnMapping,
    pub grouping: GroupingStrategy,
    pub policy: DetectionPolicy,
}

impl AnalysisConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.columns.gl_column.trim().is_empty() || self.columns.amount_column.trim().is_empty()
        {
            return Err(EngineError::invalid_policy(
                "Column names for the GL code and amount must be non-empty.",
            ));
        }
        self.grouping.validate()?;
        self.policy.validate()
    }

    pub fn from_json_str(content: &str) -> EngineResult<Self> {
        serde_json::from_str::<Self>(content).map_err(|error| {
            EngineError::invalid_argument_with_recovery(
                &format!("Config is not valid: {error}"),
                vec![
                    "Config must be a JSON object with optional `columns`, `grouping`, and `policy` keys."
                        .to_string(),
                    "Remove unknown keys; every field has a default.".to_string(),
                ],
            )
        })
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let body = fs::read_to_string(path).map_err(|error| {
            EngineError::invalid_argument_with_recovery(
                &format!("Could not read config `{}`: {error}", path.display()),
                vec!["Verify the config path exists and is readable.".to_string()],
            )
        })?;
        Self::from_json_str(&body)
    }
}
