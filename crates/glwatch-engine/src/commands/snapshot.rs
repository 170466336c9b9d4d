use std::path::Path;

use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::SnapshotListData;
use crate::setup::open_store;
use crate::snapshots::{get_snapshot, list_snapshots};
use crate::EngineResult;

#[derive(Debug, Default)]
pub struct SnapshotListOptions<'a> {
    pub home_override: Option<&'a Path>,
}

#[derive(Debug, Default)]
pub struct SnapshotShowOptions<'a> {
    pub snapshot_id: String,
    pub home_override: Option<&'a Path>,
}

pub fn list() -> EngineResult<SuccessEnvelope> {
    list_with_options(SnapshotListOptions::default())
}

#[doc(hidden)]
pub fn list_with_options(options: SnapshotListOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let store = open_store(options.home_override)?;
    let snapshots = list_snapshots(&store.connection, &store.db_path)?;
    success(
        "snapshot list",
        SnapshotListData {
            db_path: store.db_path.display().to_string(),
            snapshots,
        },
    )
}

pub fn show(snapshot_id: String) -> EngineResult<SuccessEnvelope> {
    show_with_options(SnapshotShowOptions {
        snapshot_id,
        home_override: None,
    })
}

#[doc(hidden)]
pub fn show_with_options(options: SnapshotShowOptions<'_>) -> EngineResult<SuccessEnvelope> {
    let store = open_store(options.home_override)?;
    let record = get_snapshot(&store.connection, &store.db_path, &options.snapshot_id)?;
    success("snapshot show", record)
}
