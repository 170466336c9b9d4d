use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use ulid::Ulid;

use crate::grouping::{GroupAggregate, GroupingStrategy};
use crate::state::map_sqlite_error;
use crate::{EngineError, EngineResult};

/// One persisted aggregate set: the "previous period" input of a later run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub snapshot_id: String,
    pub created_at: String,
    pub period: Option<String>,
    pub grouping: GroupingStrategy,
    pub source_ref: Option<String>,
    pub aggregates: Vec<GroupAggregate>,
}

impl SnapshotRecord {
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            snapshot_id: self.snapshot_id.clone(),
            created_at: self.created_at.clone(),
            period: self.period.clone(),
            grouping: self.grouping,
            source_ref: self.source_ref.clone(),
            group_count: self.aggregates.len() as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub snapshot_id: String,
    pub created_at: String,
    pub period: Option<String>,
    pub grouping: GroupingStrategy,
    pub source_ref: Option<String>,
    pub group_count: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct NewSnapshot<'a> {
    pub grouping: &'a GroupingStrategy,
    pub aggregates: &'a [GroupAggregate],
    pub period: Option<&'a str>,
    pub source_ref: Option<&'a str>,
}

/// A previous-period set loaded from a file given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousFile {
    /// Present when the file was a full snapshot record.
    pub snapshot_id: Option<String>,
    pub grouping: Option<GroupingStrategy>,
    pub aggregates: Vec<GroupAggregate>,
}

const SNAPSHOT_COLUMNS: &str =
    "snapshot_id, created_at, period, grouping_json, source_ref, aggregates_json";

pub fn save_snapshot(
    connection: &Connection,
    db_path: &Path,
    snapshot: NewSnapshot<'_>,
) -> EngineResult<SnapshotRecord> {
    let snapshot_id = format!("snap_{}", Ulid::new());
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let grouping_json = grouping_key(snapshot.grouping)?;
    let aggregates_json = serde_json::to_string(snapshot.aggregates)
        .map_err(|error| EngineError::internal_serialization(&error.to_string()))?;

    connection
        .execute(
            "INSERT INTO internal_snapshots (
                snapshot_id, created_at, period, grouping_kind, grouping_json,
                source_ref, group_count, aggregates_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                snapshot_id,
                created_at,
                snapshot.period,
                snapshot.grouping.kind(),
                grouping_json,
                snapshot.source_ref,
                snapshot.aggregates.len() as i64,
                aggregates_json,
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    debug!(%snapshot_id, groups = snapshot.aggregates.len(), "snapshot saved");

    Ok(SnapshotRecord {
        snapshot_id,
        created_at,
        period: snapshot.period.map(str::to_string),
        grouping: *snapshot.grouping,
        source_ref: snapshot.source_ref.map(str::to_string),
        aggregates: snapshot.aggregates.to_vec(),
    })
}

/// Most recent snapshot taken under `grouping`, if any.
pub fn latest_snapshot(
    connection: &Connection,
    db_path: &Path,
    grouping: &GroupingStrategy,
) -> EngineResult<Option<SnapshotRecord>> {
    let grouping_json = grouping_key(grouping)?;
    let raw = connection
        .query_row(
            &format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM internal_snapshots
                 WHERE grouping_json = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1"
            ),
            params![grouping_json],
            read_raw_snapshot,
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    raw.map(|value| value.into_record(db_path)).transpose()
}

pub fn get_snapshot(
    connection: &Connection,
    db_path: &Path,
    snapshot_id: &str,
) -> EngineResult<SnapshotRecord> {
    let raw = connection
        .query_row(
            &format!("SELECT {SNAPSHOT_COLUMNS} FROM internal_snapshots WHERE snapshot_id = ?1"),
            params![snapshot_id],
            read_raw_snapshot,
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    match raw {
        Some(value) => value.into_record(db_path),
        None => Err(EngineError::snapshot_not_found(snapshot_id)),
    }
}

/// Summaries of every stored snapshot, newest first.
pub fn list_snapshots(
    connection: &Connection,
    db_path: &Path,
) -> EngineResult<Vec<SnapshotSummary>> {
    let mut statement = connection
        .prepare(
            "SELECT snapshot_id, created_at, period, grouping_json, source_ref, group_count
             FROM internal_snapshots
             ORDER BY created_at DESC, rowid DESC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let rows = statement
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut summaries = Vec::new();
    for row in rows {
        let (snapshot_id, created_at, period, grouping_json, source_ref, group_count) =
            row.map_err(|error| map_sqlite_error(db_path, &error))?;
        summaries.push(SnapshotSummary {
            snapshot_id,
            created_at,
            period,
            grouping: parse_grouping(&grouping_json, db_path)?,
            source_ref,
            group_count,
        });
    }
    Ok(summaries)
}

/// Reads a previous-period file: either a full snapshot record or a bare
/// array of group aggregates.
pub fn load_previous_file(path: &Path) -> EngineResult<PreviousFile> {
    let location = path.display().to_string();
    let body = fs::read_to_string(path)
        .map_err(|error| EngineError::snapshot_file_unreadable(&location, &error.to_string()))?;
    let body = body.trim_start_matches('\u{feff}');

    let value = serde_json::from_str::<Value>(body)
        .map_err(|error| EngineError::snapshot_file_unreadable(&location, &error.to_string()))?;

    // `--json` output wraps the payload in a success envelope.
    let value = match value.get("data") {
        Some(inner) if value.get("ok").is_some() => inner.clone(),
        _ => value,
    };
    // `aggregate --json` carries the array under `aggregates`.
    let bare_aggregates = value
        .as_object()
        .filter(|object| !object.contains_key("snapshot_id"))
        .and_then(|object| object.get("aggregates"))
        .cloned();
    let value = bare_aggregates.unwrap_or(value);

    if value.is_array() {
        let aggregates = serde_json::from_value::<Vec<GroupAggregate>>(value).map_err(|error| {
            EngineError::snapshot_file_unreadable(&location, &error.to_string())
        })?;
        return Ok(PreviousFile {
            snapshot_id: None,
            grouping: None,
            aggregates: reconcile_totals(aggregates, &location)?,
        });
    }

    let record = serde_json::from_value::<SnapshotRecord>(value)
        .map_err(|error| EngineError::snapshot_file_unreadable(&location, &error.to_string()))?;
    Ok(PreviousFile {
        snapshot_id: Some(record.snapshot_id),
        grouping: Some(record.grouping),
        aggregates: reconcile_totals(record.aggregates, &location)?,
    })
}

/// Totals must be finite and non-negative; `net` is recomputed from them.
fn reconcile_totals(
    aggregates: Vec<GroupAggregate>,
    location: &str,
) -> EngineResult<Vec<GroupAggregate>> {
    aggregates
        .into_iter()
        .map(|mut group| {
            let totals = [group.positive_total, group.negative_total];
            if group.count < 0 || totals.iter().any(|total| !total.is_finite() || *total < 0.0) {
                return Err(EngineError::snapshot_file_unreadable(
                    location,
                    &format!(
                        "group `{}` needs non-negative finite totals and count",
                        group.group_key
                    ),
                ));
            }
            group.net = group.positive_total - group.negative_total;
            Ok(group)
        })
        .collect()
}

struct RawSnapshot {
    snapshot_id: String,
    created_at: String,
    period: Option<String>,
    grouping_json: String,
    source_ref: Option<String>,
    aggregates_json: String,
}

impl RawSnapshot {
    fn into_record(self, db_path: &Path) -> EngineResult<SnapshotRecord> {
        let aggregates = serde_json::from_str::<Vec<GroupAggregate>>(&self.aggregates_json)
            .map_err(|_| EngineError::store_corrupt(db_path))?;
        Ok(SnapshotRecord {
            snapshot_id: self.snapshot_id,
            created_at: self.created_at,
            period: self.period,
            grouping: parse_grouping(&self.grouping_json, db_path)?,
            source_ref: self.source_ref,
            aggregates,
        })
    }
}

fn read_raw_snapshot(row: &Row<'_>) -> rusqlite::Result<RawSnapshot> {
    Ok(RawSnapshot {
        snapshot_id: row.get(0)?,
        created_at: row.get(1)?,
        period: row.get(2)?,
        grouping_json: row.get(3)?,
        source_ref: row.get(4)?,
        aggregates_json: row.get(5)?,
    })
}

fn grouping_key(grouping: &GroupingStrategy) -> EngineResult<String> {
    serde_json::to_string(grouping)
        .map_err(|error| EngineError::internal_serialization(&error.to_string()))
}

fn parse_grouping(grouping_json: &str, db_path: &Path) -> EngineResult<GroupingStrategy> {
    serde_json::from_str::<GroupingStrategy>(grouping_json)
        .map_err(|_| EngineError::store_corrupt(db_path))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::grouping::{Category, GroupAggregate, GroupKey, GroupingStrategy};
    use crate::setup::open_store;

    use super::{
        NewSnapshot, get_snapshot, latest_snapshot, list_snapshots, load_previous_file,
        save_snapshot,
    };

    fn assets(net: f64) -> GroupAggregate {
        GroupAggregate {
            group_key: GroupKey::Category {
                category: Category::Assets,
            },
            label: "Assets".to_string(),
            positive_total: net.max(0.0),
            negative_total: (-net).max(0.0),
            net,
            count: 1,
        }
    }

    #[test]
    fn latest_snapshot_is_scoped_to_grouping_and_newest_wins() {
        let temp = tempdir();
        assert!(temp.is_ok());
        let Ok(dir) = temp else { return };
        let opened = open_store(Some(dir.path()));
        assert!(opened.is_ok());
        let Ok(store) = opened else { return };

        let category = GroupingStrategy::Category;
        let range = GroupingStrategy::Range { step: 1_000 };
        let first = [assets(10.0)];
        let second = [assets(20.0)];

        for (grouping, aggregates, period) in [
            (&category, &first[..], "2024-01"),
            (&category, &second[..], "2024-02"),
            (&range, &[][..], "2024-02"),
        ] {
            let saved = save_snapshot(
                &store.connection,
                &store.db_path,
                NewSnapshot {
                    grouping,
                    aggregates,
                    period: Some(period),
                    source_ref: None,
                },
            );
            assert!(saved.is_ok());
        }

        let latest = latest_snapshot(&store.connection, &store.db_path, &category);
        assert!(latest.is_ok());
        if let Ok(Some(record)) = latest {
            assert_eq!(record.period.as_deref(), Some("2024-02"));
            assert_eq!(record.aggregates, second.to_vec());
        }

        let none = latest_snapshot(
            &store.connection,
            &store.db_path,
            &GroupingStrategy::Range { step: 5 },
        );
        assert!(matches!(none, Ok(None)));

        let listed = list_snapshots(&store.connection, &store.db_path);
        assert!(listed.is_ok());
        if let Ok(summaries) = listed {
            assert_eq!(summaries.len(), 3);
            assert_eq!(summaries[0].grouping, range);
            assert_eq!(summaries[0].group_count, 0);
        }
    }

    #[test]
    fn get_unknown_snapshot_is_not_found() {
        let temp = tempdir();
        assert!(temp.is_ok());
        let Ok(dir) = temp else { return };
        let opened = open_store(Some(dir.path()));
        assert!(opened.is_ok());
        if let Ok(store) = opened {
            let missing = get_snapshot(&store.connection, &store.db_path, "snap_missing");
            assert!(missing.is_err());
            if let Err(error) = missing {
                assert_eq!(error.code, "snapshot_not_found");
            }
        }
    }

    #[test]
    fn previous_file_accepts_record_or_bare_array() {
        let temp = tempdir();
        assert!(temp.is_ok());
        let Ok(dir) = temp else { return };

        let array_path = dir.path().join("prev.json");
        let array_body = serde_json::json!([{
            "group_key": {"kind": "category", "category": "assets"},
            "positive_total": 100.0,
            "negative_total": 0.0,
            "net": 100.0,
            "count": 1
        }]);
        assert!(std::fs::write(&array_path, array_body.to_string()).is_ok());
        let loaded = load_previous_file(&array_path);
        assert!(loaded.is_ok());
        if let Ok(previous) = loaded {
            assert!(previous.grouping.is_none());
            assert_eq!(previous.aggregates.len(), 1);
            assert_eq!(previous.aggregates[0].net, 100.0);
        }

        let record_path = dir.path().join("record.json");
        let record_body = serde_json::json!({
            "ok": true,
            "command": "snapshot show",
            "version": "0.1.0",
            "data": {
                "snapshot_id": "snap_01",
                "created_at": "2024-03-01T00:00:00.000Z",
                "period": "2024-02",
                "grouping": {"kind": "range", "step": 10},
                "source_ref": null,
                "aggregates": []
            }
        });
        assert!(std::fs::write(&record_path, record_body.to_string()).is_ok());
        let loaded = load_previous_file(&record_path);
        assert!(loaded.is_ok());
        if let Ok(previous) = loaded {
            assert_eq!(previous.snapshot_id.as_deref(), Some("snap_01"));
            assert_eq!(previous.grouping, Some(GroupingStrategy::Range { step: 10 }));
        }

        let missing = load_previous_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ref error) if error.code == "invalid_argument"));
    }

    #[test]
    fn previous_file_net_is_derived_from_totals() {
        let temp = tempdir();
        assert!(temp.is_ok());
        let Ok(dir) = temp else { return };

        let edited_path = dir.path().join("edited.json");
        let edited = serde_json::json!([
            {
                "group_key": {"kind": "category", "category": "assets"},
                "positive_total": 500.0,
                "negative_total": 50.0,
                "net": 99999.0,
                "count": 2
            },
            {
                "group_key": {"kind": "category", "category": "liabilities"},
                "positive_total": 0.0,
                "negative_total": 200.0,
                "count": 1
            }
        ]);
        assert!(std::fs::write(&edited_path, edited.to_string()).is_ok());
        let loaded = load_previous_file(&edited_path);
        assert!(loaded.is_ok());
        if let Ok(previous) = loaded {
            assert_eq!(previous.aggregates[0].net, 450.0);
            assert_eq!(previous.aggregates[1].net, -200.0);
        }

        let negative_path = dir.path().join("negative.json");
        let negative = serde_json::json!([{
            "group_key": {"kind": "category", "category": "assets"},
            "positive_total": -10.0,
            "negative_total": 0.0,
            "net": -10.0,
            "count": 1
        }]);
        assert!(std::fs::write(&negative_path, negative.to_string()).is_ok());
        let rejected = load_previous_file(&negative_path);
        assert!(rejected.is_err());
        if let Err(error) = rejected {
            assert_eq!(error.code, "invalid_argument");
            assert!(error.message.contains("Assets"));
        }
    }
}
