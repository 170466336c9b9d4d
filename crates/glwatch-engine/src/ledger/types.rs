use serde::{Deserialize, Serialize};

/// One source row as read from the frame, before numeric coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGlRow {
    pub row: i64,
    pub gl_code: Option<String>,
    pub amount: Option<String>,
}

impl RawGlRow {
    pub fn new(row: i64, gl_code: Option<&str>, amount: Option<&str>) -> Self {
        Self {
            row,
            gl_code: gl_code.map(str::to_string),
            amount: amount.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub gl_code: i64,
    pub amount: f64,
    pub source_row: i64,
}

impl Transaction {
    pub fn positive_part(&self) -> f64 {
        self.amount.max(0.0)
    }

    pub fn negative_part(&self) -> f64 {
        (-self.amount).max(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DroppedRows {
    pub total: i64,
    pub missing_gl_code: i64,
    pub invalid_gl_code: i64,
    pub missing_amount: i64,
    pub invalid_amount: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedLedger {
    pub rows_read: i64,
    pub transactions: Vec<Transaction>,
    pub dropped: DroppedRows,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnMapping {
    pub gl_column: String,
    pub amount_column: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            gl_column: "GL".to_string(),
            amount_column: "Amount".to_string(),
        }
    }
}

impl ColumnMapping {
    pub fn required_columns(&self) -> Vec<String> {
        vec![self.gl_column.clone(), self.amount_column.clone()]
    }
}
