use std::path::Path;

use serde_json::{Value, json};
use thiserror::Error;

pub(crate) const ANALYZE_HELP_COMMAND: &str = "glwatch analyze --help";

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
    pub data: Option<Value>,
}

impl EngineError {
    pub fn new(code: &str, message: &str, recovery_steps: Vec<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            recovery_steps,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::invalid_argument_for_command(message, None)
    }

    pub fn invalid_argument_for_command(message: &str, command: Option<&str>) -> Self {
        let help_hint = match command {
            Some(cmd) => format!("Run `glwatch {cmd} --help` for usage."),
            None => "Run `glwatch --help` for usage.".to_string(),
        };
        let error = Self::new("invalid_argument", message, vec![help_hint]);
        if let Some(cmd) = command {
            return error.with_data(json!({
                "command_hint": cmd,
            }));
        }
        error
    }

    pub fn invalid_argument_with_recovery(message: &str, recovery_steps: Vec<String>) -> Self {
        Self::new("invalid_argument", message, recovery_steps)
    }

    pub fn invalid_input(message: &str) -> Self {
        Self::new(
            "invalid_input",
            message,
            vec![
                "Provide a GL extract as CSV with a header row or as a JSON array of objects."
                    .to_string(),
                format!("Run `{ANALYZE_HELP_COMMAND}` to review the input contract."),
            ],
        )
    }

    pub fn invalid_input_format(message: &str, received_format: &str) -> Self {
        Self::new(
            "invalid_input_format",
            message,
            vec![
                "Provide a supported ledger format (CSV with headers or a JSON array).".to_string(),
                format!("Run `{ANALYZE_HELP_COMMAND}` to confirm column requirements."),
            ],
        )
        .with_data(json!({
            "received_format": received_format,
            "supported_formats": ["csv", "json_array"],
        }))
    }

    pub fn missing_required_columns(
        required_columns: Vec<String>,
        missing_columns: Vec<String>,
        actual_columns: Vec<String>,
    ) -> Self {
        let missing = missing_columns.join(", ");
        Self::new(
            "missing_required_columns",
            &format!("Ledger is missing required column(s): {missing}."),
            vec![
                "Include a GL code column and an amount column in the extract.".to_string(),
                "Or point at the right headers with `--gl-column` and `--amount-column`."
                    .to_string(),
            ],
        )
        .with_data(json!({
            "required_columns": required_columns,
            "missing_columns": missing_columns,
            "actual_columns": actual_columns,
        }))
    }

    pub fn invalid_policy(message: &str) -> Self {
        Self::new(
            "invalid_policy",
            message,
            vec![
                "Thresholds must be finite and non-negative; steps must be positive.".to_string(),
                "Sign ranges must be ascending, non-overlapping, with lower < upper.".to_string(),
            ],
        )
    }

    pub fn snapshot_strategy_mismatch(current: &str, previous: &str) -> Self {
        Self::new(
            "snapshot_strategy_mismatch",
            &format!(
                "Previous snapshot is grouped by `{previous}` but this run groups by `{current}`."
            ),
            vec![
                "Rerun with the grouping the snapshot was taken with.".to_string(),
                "Or pass `--no-previous` to skip the period comparison.".to_string(),
            ],
        )
        .with_data(json!({
            "current_grouping": current,
            "previous_grouping": previous,
        }))
    }

    pub fn snapshot_not_found(snapshot_id: &str) -> Self {
        Self::new(
            "snapshot_not_found",
            &format!("Snapshot id `{snapshot_id}` was not found."),
            vec!["Run `glwatch snapshot list` to find a valid snapshot id.".to_string()],
        )
        .with_data(json!({
            "snapshot_id": snapshot_id,
        }))
    }

    pub fn snapshot_file_unreadable(path: &str, detail: &str) -> Self {
        Self::invalid_argument_with_recovery(
            &format!("Could not read previous snapshot `{path}`: {detail}"),
            vec![
                "Pass a snapshot JSON file written by `glwatch snapshot show --json`.".to_string(),
                "Or a JSON array of group aggregates from `glwatch aggregate --json`.".to_string(),
            ],
        )
    }

    pub fn export_failed(path: &str, detail: &str) -> Self {
        Self::invalid_argument_with_recovery(
            &format!("Could not write flagged changes to `{path}`: {detail}"),
            vec!["Verify the destination directory exists and is writable.".to_string()],
        )
    }

    pub fn internal_serialization(message: &str) -> Self {
        Self::new("internal_serialization_error", message, Vec::new())
    }

    pub fn store_permission_denied(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "snapshot_store_permission_denied",
            &format!("Cannot open snapshot store at `{location}`: {detail}"),
            vec![format!(
                "Grant write access to `{location}` or set `GLWATCH_HOME` to a writable directory."
            )],
        )
    }

    pub fn store_locked(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "snapshot_store_locked",
            &format!("Snapshot store is locked at `{location}`."),
            vec![format!(
                "Close other processes using `{location}` so the lock is released."
            )],
        )
    }

    pub fn store_corrupt(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "snapshot_store_corrupt",
            &format!("Snapshot store appears corrupt at `{location}`."),
            vec![format!(
                "Move `{location}` aside; a fresh store is created on the next run."
            )],
        )
    }

    pub fn store_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "snapshot_store_failed",
            &format!("Snapshot store operation failed at `{location}`: {detail}"),
            Vec::new(),
        )
    }

    pub fn is_internal(&self) -> bool {
        self.code.starts_with("internal_") || self.code.starts_with("snapshot_store_")
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
