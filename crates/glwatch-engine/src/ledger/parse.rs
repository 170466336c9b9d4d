use serde_json::{Map, Value};

use crate::ledger::types::{ColumnMapping, RawGlRow};
use crate::{EngineError, EngineResult};

/// Reads a tabular GL frame (CSV with headers or a JSON array of objects)
/// and projects every row onto the configured GL and amount columns.
///
/// Missing columns are fatal here, before any row is coerced. Extra columns
/// are ignored.
pub fn parse_frame(content: &str, columns: &ColumnMapping) -> EngineResult<Vec<RawGlRow>> {
    let trimmed = content.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid_input("Ledger source is empty."));
    }

    if looks_like_ndjson(trimmed) {
        return Err(EngineError::invalid_input_format(
            "NDJSON is not supported. Provide a JSON array or CSV.",
            "ndjson",
        ));
    }

    if trimmed.starts_with('[') {
        return parse_json_array(trimmed, columns);
    }

    if serde_json::from_str::<Value>(trimmed).is_ok() {
        return Err(EngineError::invalid_input_format(
            "JSON input must be a top-level array of row objects.",
            "json_non_array",
        ));
    }

    if looks_like_csv(trimmed) {
        return parse_csv(trimmed, columns);
    }

    Err(EngineError::invalid_input_format(
        "Unsupported ledger format. Provide a JSON array or CSV with headers.",
        "unknown",
    ))
}

fn parse_json_array(content: &str, columns: &ColumnMapping) -> EngineResult<Vec<RawGlRow>> {
    let parsed = serde_json::from_str::<Value>(content).map_err(|_| {
        EngineError::invalid_input("Invalid JSON input. Provide a valid JSON array.")
    })?;

    let Some(items) = parsed.as_array() else {
        return Err(EngineError::invalid_input(
            "JSON input must be a top-level array of row objects.",
        ));
    };

    let mut objects = Vec::with_capacity(items.len());
    for item in items {
        let Some(object) = item.as_object() else {
            return Err(EngineError::invalid_input(
                "JSON array entries must all be objects keyed by column name.",
            ));
        };
        objects.push(object);
    }

    if objects.is_empty() {
        return Ok(Vec::new());
    }

    let mut actual_columns: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !actual_columns.iter().any(|known| known == key) {
                actual_columns.push(key.clone());
            }
        }
    }
    let gl_key = resolve_column(&actual_columns, &columns.gl_column);
    let amount_key = resolve_column(&actual_columns, &columns.amount_column);
    let (Some(gl_key), Some(amount_key)) = (gl_key, amount_key) else {
        return Err(missing_columns_error(columns, actual_columns));
    };

    let rows = objects
        .iter()
        .enumerate()
        .map(|(index, object)| RawGlRow {
            row: (index as i64) + 1,
            gl_code: read_json_cell(object, &actual_columns[gl_key]),
            amount: read_json_cell(object, &actual_columns[amount_key]),
        })
        .collect();
    Ok(rows)
}

fn parse_csv(content: &str, columns: &ColumnMapping) -> EngineResult<Vec<RawGlRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|_| EngineError::invalid_input("CSV header row is missing or unreadable."))?
        .iter()
        .map(|value| value.trim().to_string())
        .collect::<Vec<String>>();

    let gl_index = resolve_column(&headers, &columns.gl_column);
    let amount_index = resolve_column(&headers, &columns.amount_column);
    let (Some(gl_index), Some(amount_index)) = (gl_index, amount_index) else {
        return Err(missing_columns_error(columns, headers));
    };

    let mut rows = Vec::new();
    for (row_index, result_row) in reader.records().enumerate() {
        let record = result_row
            .map_err(|_| EngineError::invalid_input("CSV rows are malformed or not UTF-8."))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        rows.push(RawGlRow {
            row: (row_index as i64) + 1,
            gl_code: record.get(gl_index).map(str::to_string),
            amount: record.get(amount_index).map(str::to_string),
        });
    }

    Ok(rows)
}

fn resolve_column(actual: &[String], wanted: &str) -> Option<usize> {
    let wanted = wanted.trim();
    actual
        .iter()
        .position(|name| name.trim() == wanted)
        .or_else(|| {
            actual
                .iter()
                .position(|name| name.trim().eq_ignore_ascii_case(wanted))
        })
}

fn missing_columns_error(columns: &ColumnMapping, actual: Vec<String>) -> EngineError {
    let missing = columns
        .required_columns()
        .into_iter()
        .filter(|required| resolve_column(&actual, required).is_none())
        .collect::<Vec<String>>();
    EngineError::missing_required_columns(columns.required_columns(), missing, actual)
}

fn read_json_cell(object: &Map<String, Value>, key: &str) -> Option<String> {
    let current = object.get(key)?;

    if current.is_null() {
        return None;
    }

    if let Some(string_value) = current.as_str() {
        return Some(string_value.to_string());
    }

    Some(current.to_string())
}

fn looks_like_ndjson(content: &str) -> bool {
    let lines = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<&str>>();
    if lines.len() < 2 {
        return false;
    }

    lines.iter().all(|line| {
        let parsed = serde_json::from_str::<Value>(line.trim());
        if let Ok(value) = parsed {
            return value.is_object();
        }
        false
    })
}

/// A header line with a comma, or a lone header cell (a one-column extract)
/// that is not the start of a JSON object.
fn looks_like_csv(content: &str) -> bool {
    let Some(first_line) = content.lines().find(|line| !line.trim().is_empty()) else {
        return false;
    };
    first_line.contains(',') || !first_line.trim_start().starts_with('{')
}
