use std::path::{Path, PathBuf};

use tracing::warn;

use crate::commands::common::{ConfigOverrides, resolve_config, source_info};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{AnalysisData, ExportInfo, PreviousInfo};
use crate::detection::ChangeFinding;
use crate::grouping::{GroupAggregate, GroupingStrategy};
use crate::ledger::input::resolve_source;
use crate::pipeline::analyze_frame;
use crate::report::AnomalyReport;
use crate::setup::open_store;
use crate::snapshots::{NewSnapshot, latest_snapshot, load_previous_file, save_snapshot};
use crate::{EngineError, EngineResult};

/// How the previous-period aggregates are found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PreviousSource {
    /// Latest stored snapshot with the same grouping; absent is fine.
    #[default]
    LatestStored,
    File(PathBuf),
    Skip,
}

#[derive(Debug, Default)]
pub struct AnalyzeRunOptions<'a> {
    pub path: Option<String>,
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
    pub previous: PreviousSource,
    pub save_snapshot: bool,
    pub period: Option<String>,
    pub export_flagged: Option<PathBuf>,
    pub home_override: Option<&'a Path>,
    pub stdin_override: Option<String>,
}

pub fn run(options: AnalyzeRunOptions<'_>) -> EngineResult<SuccessEnvelope> {
    run_with_options(options)
}

#[doc(hidden)]
pub fn run_with_options(options: AnalyzeRunOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let config = resolve_config(
        options.config_path.as_deref(),
        &options.overrides,
        "analyze",
    )?;
    let source = resolve_source(options.path.clone(), options.stdin_override.clone())?;

    let mut warnings = Vec::new();
    let previous = load_previous(&options, &config.grouping, &mut warnings)?;
    let outcome = analyze_frame(
        &source.content,
        &config,
        previous
            .as_ref()
            .map(|(_, aggregates)| aggregates.as_slice()),
    )?;

    let exported_flagged = match &options.export_flagged {
        Some(path) => Some(export_flagged_changes(path, &outcome.report)?),
        None => None,
    };

    let saved_snapshot = if options.save_snapshot {
        let saved = open_store(options.home_override).and_then(|store| {
            save_snapshot(
                &store.connection,
                &store.db_path,
                NewSnapshot {
                    grouping: &config.grouping,
                    aggregates: &outcome.aggregates,
                    period: options.period.as_deref(),
                    source_ref: source.source_ref.as_deref(),
                },
            )
        });
        match saved {
            Ok(record) => Some(record.summary()),
            Err(error) => {
                warn!(code = %error.code, "snapshot save failed: {}", error.message);
                warnings.push(format!("Snapshot was not saved: {}", error.message));
                None
            }
        }
    } else {
        None
    };

    let data = AnalysisData {
        source: source_info(&source),
        config,
        previous: previous.map(|(info, _)| info),
        report: outcome.report,
        aggregates: outcome.aggregates,
        saved_snapshot,
        exported_flagged,
        warnings,
    };

    success("analyze", data)
}

fn load_previous(
    options: &AnalyzeRunOptions<'_>,
    grouping: &GroupingStrategy,
    warnings: &mut Vec<String>,
) -> EngineResult<Option<(PreviousInfo, Vec<GroupAggregate>)>> {
    match &options.previous {
        PreviousSource::Skip => Ok(None),
        PreviousSource::File(path) => {
            let previous = load_previous_file(path)?;
            if let Some(previous_grouping) = previous.grouping
                && previous_grouping != *grouping
            {
                return Err(EngineError::snapshot_strategy_mismatch(
                    &grouping.describe(),
                    &previous_grouping.describe(),
                ));
            }
            let info = PreviousInfo {
                origin: "file".to_string(),
                snapshot_id: previous.snapshot_id,
                path: Some(path.display().to_string()),
                period: None,
                group_count: previous.aggregates.len() as i64,
            };
            Ok(Some((info, previous.aggregates)))
        }
        PreviousSource::LatestStored => {
            let latest = open_store(options.home_override)
                .and_then(|store| latest_snapshot(&store.connection, &store.db_path, grouping));
            match latest {
                Ok(Some(record)) => {
                    let info = PreviousInfo {
                        origin: "store".to_string(),
                        snapshot_id: Some(record.snapshot_id.clone()),
                        path: None,
                        period: record.period.clone(),
                        group_count: record.aggregates.len() as i64,
                    };
                    Ok(Some((info, record.aggregates)))
                }
                Ok(None) => Ok(None),
                Err(error) => {
                    warn!(code = %error.code, "previous snapshot lookup failed: {}", error.message);
                    warnings.push(format!(
                        "Previous snapshot unavailable, change detection skipped: {}",
                        error.message
                    ));
                    Ok(None)
                }
            }
        }
    }
}

fn export_flagged_changes(path: &Path, report: &AnomalyReport) -> EngineResult<ExportInfo> {
    let location = path.display().to_string();
    let map_csv_error =
        |error: csv::Error| EngineError::export_failed(&location, &error.to_string());

    let mut writer = csv::Writer::from_path(path).map_err(map_csv_error)?;
    writer
        .write_record([
            "group", "presence", "curr_net", "prev_net", "diff_net", "pct_net", "curr_count",
            "prev_count",
        ])
        .map_err(map_csv_error)?;

    let mut rows = 0_i64;
    for finding in report.flagged_changes() {
        writer
            .write_record(flagged_change_record(finding))
            .map_err(map_csv_error)?;
        rows += 1;
    }
    writer
        .flush()
        .map_err(|error| EngineError::export_failed(&location, &error.to_string()))?;

    Ok(ExportInfo {
        path: location,
        rows,
    })
}

fn flagged_change_record(finding: &ChangeFinding) -> [String; 8] {
    let presence = serde_json::to_value(finding.presence)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();
    [
        finding.label.clone(),
        presence,
        finding.curr_net.to_string(),
        finding.prev_net.to_string(),
        finding.diff_net.to_string(),
        finding
            .pct_net
            .map(|pct| pct.to_string())
            .unwrap_or_default(),
        finding.curr_count.to_string(),
        finding.prev_count.to_string(),
    ]
}
