use std::io;

use serde_json::Value;

use super::format::{
    Align, Column, format_amount, format_pct, format_signed_amount, key_value_rows,
    render_table_or_blocks, terminal_width,
};

pub fn render_analysis(data: &Value) -> io::Result<String> {
    let report = data
        .get("report")
        .ok_or_else(|| io::Error::other("analysis output is missing `report`"))?;
    let summary = &report["summary"];
    let width = terminal_width();

    let mut lines = vec![
        format!(
            "Analysis of {} ({} grouping)",
            source_label(&data["source"]),
            grouping_label(&report["grouping"])
        ),
        String::new(),
    ];
    lines.extend(key_value_rows(
        &[
            ("Rows read:", int_text(&summary["rows_read"])),
            ("Transactions:", int_text(&summary["transactions"])),
            ("Rows dropped:", dropped_text(&report["dropped_rows"])),
            ("Compared to:", previous_text(&data["previous"])),
        ],
        2,
    ));

    lines.push(String::new());
    lines.push("Group totals:".to_string());
    push_or_none(&mut lines, aggregate_table(&data["aggregates"], width));

    let field = data["config"]["policy"]["zscore_field"]
        .as_str()
        .unwrap_or("net");
    let threshold = number(&data["config"]["policy"]["z_threshold"]);
    lines.push(String::new());
    lines.push(format!("Z-score anomalies ({field}, |z| > {threshold}):"));
    push_or_none(&mut lines, zscore_table(&report["zscore_findings"], width));

    lines.push(String::new());
    lines.push(format!("Transaction outliers (amount, |z| > {threshold}):"));
    push_or_none(&mut lines, outlier_table(&report["transaction_findings"], width));

    if summary["compared_to_previous"].as_bool() == Some(true) {
        lines.push(String::new());
        lines.push("Changes vs previous period:".to_string());
        push_or_none(&mut lines, change_table(&report["change_findings"], width));
    }

    lines.push(String::new());
    lines.push("Sign anomalies:".to_string());
    push_or_none(&mut lines, sign_table(&report["sign_findings"], width));
    let indeterminate = rows_of(&report["sign_ranges"])
        .iter()
        .filter(|range| range["status"] == "indeterminate")
        .map(|range| text(&range["label"]))
        .collect::<Vec<String>>();
    if !indeterminate.is_empty() {
        lines.push(format!(
            "  Ranges with a positive/negative tie (no expected sign): {}",
            indeterminate.join(", ")
        ));
    }

    lines.push(String::new());
    lines.extend(render_digest(summary));

    let warnings = rows_of(&data["warnings"]);
    if !warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings:".to_string());
        for warning in warnings {
            lines.push(format!("  - {}", text(warning)));
        }
    }

    if let Some(snapshot_id) = data["saved_snapshot"]["snapshot_id"].as_str() {
        lines.push(String::new());
        lines.push(format!("Snapshot saved: {snapshot_id}"));
    }
    if data["exported_flagged"].is_object() {
        lines.push(format!(
            "Flagged changes exported: {} ({} rows)",
            text(&data["exported_flagged"]["path"]),
            int_text(&data["exported_flagged"]["rows"])
        ));
    }

    Ok(lines.join("\n"))
}

/// The short per-detector count summary.
pub fn render_digest(summary: &Value) -> Vec<String> {
    let mut lines = vec![format!(
        "Z-score anomalies found: {}",
        int_text(&summary["zscore_count"])
    )];
    if summary["compared_to_previous"].as_bool() == Some(true) {
        lines.push(format!(
            "Change anomalies found: {}",
            int_text(&summary["change_count"])
        ));
    } else {
        lines.push("Change anomalies found: n/a (no previous period)".to_string());
    }
    lines.push(format!(
        "Sign anomalies found: {}",
        int_text(&summary["sign_count"])
    ));
    lines.push(format!(
        "Transaction outliers found: {}",
        int_text(&summary["transaction_outlier_count"])
    ));
    lines
}

pub fn render_aggregate(data: &Value) -> io::Result<String> {
    let aggregates = data
        .get("aggregates")
        .ok_or_else(|| io::Error::other("aggregate output is missing `aggregates`"))?;

    let mut lines = vec![
        format!(
            "Group totals for {} ({} grouping)",
            source_label(&data["source"]),
            grouping_label(&data["grouping"])
        ),
        String::new(),
    ];
    lines.extend(key_value_rows(
        &[
            ("Transactions:", int_text(&data["ledger"]["transactions"])),
            ("Rows dropped:", dropped_text(&data["dropped_rows"])),
        ],
        2,
    ));
    lines.push(String::new());
    push_or_none(&mut lines, aggregate_table(aggregates, terminal_width()));
    Ok(lines.join("\n"))
}

pub fn render_snapshot_list(data: &Value) -> io::Result<String> {
    let snapshots = rows_of(&data["snapshots"]);
    if snapshots.is_empty() {
        return Ok([
            "No snapshots saved yet.",
            "",
            "Run `glwatch analyze <path> --save-snapshot` to save one.",
        ]
        .join("\n"));
    }

    let columns = [
        Column {
            name: "Snapshot",
            align: Align::Left,
        },
        Column {
            name: "Created",
            align: Align::Left,
        },
        Column {
            name: "Period",
            align: Align::Left,
        },
        Column {
            name: "Grouping",
            align: Align::Left,
        },
        Column {
            name: "Groups",
            align: Align::Right,
        },
    ];
    let rows = snapshots
        .iter()
        .map(|snapshot| {
            vec![
                text(&snapshot["snapshot_id"]),
                text(&snapshot["created_at"]),
                optional_text(&snapshot["period"]),
                grouping_label(&snapshot["grouping"]),
                int_text(&snapshot["group_count"]),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let mut lines = vec![format!("Snapshots in {}", text(&data["db_path"])), String::new()];
    lines.extend(render_table_or_blocks(
        &columns,
        &rows,
        terminal_width(),
        "Snapshot",
    ));
    Ok(lines.join("\n"))
}

pub fn render_snapshot_show(data: &Value) -> io::Result<String> {
    let snapshot_id = data["snapshot_id"]
        .as_str()
        .ok_or_else(|| io::Error::other("snapshot output is missing `snapshot_id`"))?;

    let mut lines = vec![format!("Snapshot {snapshot_id}"), String::new()];
    lines.extend(key_value_rows(
        &[
            ("Created:", text(&data["created_at"])),
            ("Period:", optional_text(&data["period"])),
            ("Grouping:", grouping_label(&data["grouping"])),
            ("Source:", optional_text(&data["source_ref"])),
        ],
        2,
    ));
    lines.push(String::new());
    push_or_none(&mut lines, aggregate_table(&data["aggregates"], terminal_width()));
    Ok(lines.join("\n"))
}

fn aggregate_table(aggregates: &Value, width: usize) -> Vec<String> {
    let columns = [
        Column {
            name: "Group",
            align: Align::Left,
        },
        Column {
            name: "Count",
            align: Align::Right,
        },
        Column {
            name: "Positive",
            align: Align::Right,
        },
        Column {
            name: "Negative",
            align: Align::Right,
        },
        Column {
            name: "Net",
            align: Align::Right,
        },
    ];
    let rows = rows_of(aggregates)
        .iter()
        .map(|group| {
            vec![
                group_label(group),
                int_text(&group["count"]),
                format_amount(number(&group["positive_total"])),
                format_amount(number(&group["negative_total"])),
                format_amount(number(&group["net"])),
            ]
        })
        .collect::<Vec<Vec<String>>>();
    render_table_or_blocks(&columns, &rows, width, "Group")
}

fn zscore_table(findings: &Value, width: usize) -> Vec<String> {
    let columns = [
        Column {
            name: "Group",
            align: Align::Left,
        },
        Column {
            name: "Value",
            align: Align::Right,
        },
        Column {
            name: "Net",
            align: Align::Right,
        },
        Column {
            name: "Z",
            align: Align::Right,
        },
    ];
    let rows = rows_of(findings)
        .iter()
        .map(|finding| {
            vec![
                text(&finding["label"]),
                format_amount(number(&finding["value"])),
                format_amount(number(&finding["net"])),
                format!("{:+.2}", number(&finding["zscore"])),
            ]
        })
        .collect::<Vec<Vec<String>>>();
    render_table_or_blocks(&columns, &rows, width, "Finding")
}

fn outlier_table(findings: &Value, width: usize) -> Vec<String> {
    let columns = [
        Column {
            name: "GL code",
            align: Align::Right,
        },
        Column {
            name: "Amount",
            align: Align::Right,
        },
        Column {
            name: "Row",
            align: Align::Right,
        },
        Column {
            name: "Z",
            align: Align::Right,
        },
    ];
    let rows = rows_of(findings)
        .iter()
        .map(|finding| {
            vec![
                int_text(&finding["gl_code"]),
                format_amount(number(&finding["amount"])),
                int_text(&finding["source_row"]),
                format!("{:+.2}", number(&finding["zscore"])),
            ]
        })
        .collect::<Vec<Vec<String>>>();
    render_table_or_blocks(&columns, &rows, width, "Outlier")
}

fn change_table(findings: &Value, width: usize) -> Vec<String> {
    let columns = [
        Column {
            name: "Group",
            align: Align::Left,
        },
        Column {
            name: "Previous",
            align: Align::Right,
        },
        Column {
            name: "Current",
            align: Align::Right,
        },
        Column {
            name: "Diff",
            align: Align::Right,
        },
        Column {
            name: "Pct",
            align: Align::Right,
        },
        Column {
            name: "Note",
            align: Align::Left,
        },
    ];
    let rows = rows_of(findings)
        .iter()
        .map(|finding| {
            let mut note = Vec::new();
            if finding["flagged"].as_bool() == Some(true) {
                note.push("FLAGGED");
            }
            match finding["presence"].as_str() {
                Some("appeared") => note.push("new group"),
                Some("disappeared") => note.push("group vanished"),
                _ => {}
            }
            vec![
                text(&finding["label"]),
                format_amount(number(&finding["prev_net"])),
                format_amount(number(&finding["curr_net"])),
                format_signed_amount(number(&finding["diff_net"])),
                format_pct(finding["pct_net"].as_f64()),
                note.join(", "),
            ]
        })
        .collect::<Vec<Vec<String>>>();
    render_table_or_blocks(&columns, &rows, width, "Change")
}

fn sign_table(findings: &Value, width: usize) -> Vec<String> {
    let columns = [
        Column {
            name: "Range",
            align: Align::Left,
        },
        Column {
            name: "GL code",
            align: Align::Right,
        },
        Column {
            name: "Amount",
            align: Align::Right,
        },
        Column {
            name: "Row",
            align: Align::Right,
        },
        Column {
            name: "Expected",
            align: Align::Left,
        },
    ];
    let rows = rows_of(findings)
        .iter()
        .map(|finding| {
            vec![
                text(&finding["range_label"]),
                int_text(&finding["gl_code"]),
                format_amount(number(&finding["amount"])),
                int_text(&finding["source_row"]),
                format!(
                    "{} ({})",
                    text(&finding["expected_sign"]),
                    text(&finding["basis"])
                ),
            ]
        })
        .collect::<Vec<Vec<String>>>();
    render_table_or_blocks(&columns, &rows, width, "Finding")
}

fn push_or_none(lines: &mut Vec<String>, table: Vec<String>) {
    if table.is_empty() {
        lines.push("  None.".to_string());
    } else {
        lines.extend(table);
    }
}

fn source_label(source: &Value) -> String {
    match source["reference"].as_str() {
        Some(reference) => reference.to_string(),
        None => text(&source["kind"]),
    }
}

fn grouping_label(grouping: &Value) -> String {
    match grouping["kind"].as_str() {
        Some("range") => format!("range, step {}", int_text(&grouping["step"])),
        Some(kind) => kind.to_string(),
        None => "unknown".to_string(),
    }
}

fn group_label(group: &Value) -> String {
    match group["label"].as_str() {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => match group["group_key"]["kind"].as_str() {
            Some("range") => format!(
                "[{}, {})",
                int_text(&group["group_key"]["lower"]),
                int_text(&group["group_key"]["upper"])
            ),
            _ => text(&group["group_key"]["category"]),
        },
    }
}

fn previous_text(previous: &Value) -> String {
    if !previous.is_object() {
        return "no previous period".to_string();
    }
    let name = match (previous["snapshot_id"].as_str(), previous["path"].as_str()) {
        (Some(snapshot_id), _) => format!("snapshot {snapshot_id}"),
        (None, Some(path)) => path.to_string(),
        (None, None) => "previous aggregates".to_string(),
    };
    match previous["period"].as_str() {
        Some(period) => format!("{name} ({period})"),
        None => name,
    }
}

fn dropped_text(dropped: &Value) -> String {
    let total = dropped["total"].as_i64().unwrap_or(0);
    if total == 0 {
        return "0".to_string();
    }

    let reasons = [
        ("missing GL", "missing_gl_code"),
        ("invalid GL", "invalid_gl_code"),
        ("missing amount", "missing_amount"),
        ("invalid amount", "invalid_amount"),
    ]
    .iter()
    .filter_map(|(label, key)| {
        let count = dropped[*key].as_i64().unwrap_or(0);
        (count > 0).then(|| format!("{label} {count}"))
    })
    .collect::<Vec<String>>();
    format!("{total}  ({})", reasons.join(", "))
}

fn rows_of(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

fn int_text(value: &Value) -> String {
    match value.as_i64() {
        Some(number) => number.to_string(),
        None => text(value),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn optional_text(value: &Value) -> String {
    value.as_str().unwrap_or("-").to_string()
}
