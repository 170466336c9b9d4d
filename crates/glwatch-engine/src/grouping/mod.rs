pub mod aggregate;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EngineError, EngineResult};

pub use aggregate::{GroupAggregate, aggregate};

/// Leading-digit account category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Unknown,
    Assets,
    Liabilities,
    Equity,
    Revenue,
    Expenses,
    CostOfGoodsSold,
    OtherIncome,
    OtherExpenses,
    Adjustments,
}

impl Category {
    pub fn from_gl_code(gl_code: i64) -> Self {
        let magnitude = gl_code.unsigned_abs();
        let leading = magnitude
            .to_string()
            .chars()
            .next()
            .and_then(|digit| digit.to_digit(10))
            .unwrap_or(0);
        Self::from_digit(leading)
    }

    pub fn from_digit(digit: u32) -> Self {
        match digit {
            1 => Self::Assets,
            2 => Self::Liabilities,
            3 => Self::Equity,
            4 => Self::Revenue,
            5 => Self::Expenses,
            6 => Self::CostOfGoodsSold,
            7 => Self::OtherIncome,
            8 => Self::OtherExpenses,
            9 => Self::Adjustments,
            _ => Self::Unknown,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Assets => 1,
            Self::Liabilities => 2,
            Self::Equity => 3,
            Self::Revenue => 4,
            Self::Expenses => 5,
            Self::CostOfGoodsSold => 6,
            Self::OtherIncome => 7,
            Self::OtherExpenses => 8,
            Self::Adjustments => 9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Assets => "Assets",
            Self::Liabilities => "Liabilities",
            Self::Equity => "Equity",
            Self::Revenue => "Revenue",
            Self::Expenses => "Expenses",
            Self::CostOfGoodsSold => "Cost of Goods Sold",
            Self::OtherIncome => "Other Income",
            Self::OtherExpenses => "Other Expenses",
            Self::Adjustments => "Adjustments",
        }
    }
}

/// Half-open interval of GL codes, `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlRange {
    pub lower: i64,
    pub upper: i64,
}

impl GlRange {
    pub fn contains(&self, gl_code: i64) -> bool {
        self.lower <= gl_code && gl_code < self.upper
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GlRange {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[{}, {})", self.lower, self.upper)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupKey {
    Category { category: Category },
    Range { lower: i64, upper: i64 },
}

impl GroupKey {
    pub fn label(&self) -> String {
        match self {
            Self::Category { category } => category.label().to_string(),
            Self::Range { lower, upper } => GlRange {
                lower: *lower,
                upper: *upper,
            }
            .label(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Category { .. } => "category",
            Self::Range { .. } => "range",
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.label())
    }
}

/// Maps a GL code onto a group key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupingStrategy {
    #[default]
    Category,
    Range { step: i64 },
}

impl GroupingStrategy {
    pub fn range(step: i64) -> EngineResult<Self> {
        let strategy = Self::Range { step };
        strategy.validate()?;
        Ok(strategy)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if let Self::Range { step } = self
            && *step <= 0
        {
            return Err(EngineError::invalid_policy(&format!(
                "Range grouping step must be positive, got {step}."
            )));
        }
        Ok(())
    }

    pub fn group_key(&self, gl_code: i64) -> GroupKey {
        match self {
            Self::Category => GroupKey::Category {
                category: Category::from_gl_code(gl_code),
            },
            Self::Range { step } => {
                let step = (*step).max(1);
                let lower = gl_code.div_euclid(step).saturating_mul(step);
                GroupKey::Range {
                    lower,
                    upper: lower.saturating_add(step),
                }
            }
        }
    }

    /// Range buckets without any positive or negative activity are dropped
    /// from aggregate output; category groups are kept.
    pub fn drops_inactive_groups(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Range { .. } => "range",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Category => "category".to_string(),
            Self::Range { step } => format!("range(step={step})"),
        }
    }
}
