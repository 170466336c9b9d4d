use std::path::{Path, PathBuf};

use crate::commands::common::{ConfigOverrides, resolve_config, source_info};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::AggregateData;
use crate::detection::ledger_stats;
use crate::grouping::aggregate;
use crate::ledger::input::resolve_source;
use crate::ledger::{normalize_rows, parse_frame};
use crate::EngineResult;

#[derive(Debug, Default)]
pub struct AggregateRunOptions<'a> {
    pub path: Option<String>,
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
    pub home_override: Option<&'a Path>,
    pub stdin_override: Option<String>,
}

pub fn run(options: AggregateRunOptions<'_>) -> EngineResult<SuccessEnvelope> {
    run_with_options(options)
}

#[doc(hidden)]
pub fn run_with_options(options: AggregateRunOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let config = resolve_config(
        options.config_path.as_deref(),
        &options.overrides,
        "aggregate",
    )?;
    let source = resolve_source(options.path, options.stdin_override)?;
    let rows = parse_frame(&source.content, &config.columns)?;
    let ledger = normalize_rows(&rows);

    let data = AggregateData {
        source: source_info(&source),
        grouping: config.grouping,
        aggregates: aggregate(&ledger.transactions, &config.grouping),
        ledger: ledger_stats(&ledger),
        dropped_rows: ledger.dropped,
    };
    success("aggregate", data)
}
