use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::detection::LedgerStats;
use crate::grouping::{GroupAggregate, GroupingStrategy};
use crate::ledger::types::DroppedRows;
use crate::report::AnomalyReport;
use crate::snapshots::{SnapshotRecord, SnapshotSummary};

#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub kind: String,
    pub reference: Option<String>,
}

/// Where the previous-period aggregates came from.
#[derive(Debug, Clone, Serialize)]
pub struct PreviousInfo {
    /// `file` or `store`.
    pub origin: String,
    pub snapshot_id: Option<String>,
    pub path: Option<String>,
    pub period: Option<String>,
    pub group_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportInfo {
    pub path: String,
    pub rows: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisData {
    pub source: SourceInfo,
    pub config: AnalysisConfig,
    pub previous: Option<PreviousInfo>,
    pub report: AnomalyReport,
    pub aggregates: Vec<GroupAggregate>,
    pub saved_snapshot: Option<SnapshotSummary>,
    pub exported_flagged: Option<ExportInfo>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateData {
    pub source: SourceInfo,
    pub grouping: GroupingStrategy,
    pub aggregates: Vec<GroupAggregate>,
    pub dropped_rows: DroppedRows,
    pub ledger: LedgerStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotListData {
    pub db_path: String,
    pub snapshots: Vec<SnapshotSummary>,
}

pub type SnapshotShowData = SnapshotRecord;
