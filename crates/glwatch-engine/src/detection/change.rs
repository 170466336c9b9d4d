use std::collections::BTreeMap;

use serde::Serialize;

use crate::grouping::{GroupAggregate, GroupKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPresence {
    Both,
    Appeared,
    Disappeared,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentChange {
    pub curr: f64,
    pub prev: f64,
    pub diff: f64,
    pub pct: Option<f64>,
}

impl ComponentChange {
    fn between(curr: f64, prev: f64) -> Self {
        Self {
            curr,
            prev,
            diff: curr - prev,
            pct: pct_change(curr, prev),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeFinding {
    pub group_key: GroupKey,
    pub label: String,
    pub presence: GroupPresence,
    pub curr_count: i64,
    pub prev_count: i64,
    pub curr_net: f64,
    pub prev_net: f64,
    pub diff_net: f64,
    pub pct_net: Option<f64>,
    pub positive: ComponentChange,
    pub negative: ComponentChange,
    pub flagged: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ChangeThresholds {
    pub min_abs_change: f64,
    pub min_pct_change: f64,
}

impl ChangeThresholds {
    fn flags(self, diff_net: f64, pct_net: Option<f64>) -> bool {
        diff_net.abs() >= self.min_abs_change
            || pct_net.is_some_and(|pct| pct.abs() >= self.min_pct_change)
    }
}

/// Full outer join of two aggregate sets by group key.
///
/// A side without the group contributes zero totals and a zero count, so
/// `presence` and `prev_count`/`curr_count` tell a new or vanished group
/// apart from a real zero. Records are ordered by descending `|diff_net|`,
/// ties in group-key order.
pub fn detect_change_anomalies(
    current: &[GroupAggregate],
    previous: &[GroupAggregate],
    thresholds: ChangeThresholds,
) -> Vec<ChangeFinding> {
    let current_by_key = fold_by_key(current);
    let previous_by_key = fold_by_key(previous);

    let mut keys = current_by_key.keys().copied().collect::<Vec<GroupKey>>();
    keys.extend(previous_by_key.keys().copied());
    keys.sort();
    keys.dedup();

    let mut findings = keys
        .into_iter()
        .map(|key| {
            let curr = current_by_key.get(&key);
            let prev = previous_by_key.get(&key);
            join_record(key, curr, prev, thresholds)
        })
        .collect::<Vec<ChangeFinding>>();

    findings.sort_by(|left, right| right.diff_net.abs().total_cmp(&left.diff_net.abs()));
    findings
}

fn join_record(
    key: GroupKey,
    curr: Option<&GroupAggregate>,
    prev: Option<&GroupAggregate>,
    thresholds: ChangeThresholds,
) -> ChangeFinding {
    let empty = GroupAggregate::empty(key);
    let presence = match (curr, prev) {
        (Some(_), None) => GroupPresence::Appeared,
        (None, Some(_)) => GroupPresence::Disappeared,
        _ => GroupPresence::Both,
    };
    let label = curr
        .or(prev)
        .map(|group| group.label.clone())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| key.label());
    let curr = curr.unwrap_or(&empty);
    let prev = prev.unwrap_or(&empty);

    let diff_net = curr.net - prev.net;
    let pct_net = pct_change(curr.net, prev.net);
    ChangeFinding {
        group_key: key,
        label,
        presence,
        curr_count: curr.count,
        prev_count: prev.count,
        curr_net: curr.net,
        prev_net: prev.net,
        diff_net,
        pct_net,
        positive: ComponentChange::between(curr.positive_total, prev.positive_total),
        negative: ComponentChange::between(curr.negative_total, prev.negative_total),
        flagged: thresholds.flags(diff_net, pct_net),
    }
}

/// Percentage change relative to `|prev|`; undefined when `prev` is zero.
fn pct_change(curr: f64, prev: f64) -> Option<f64> {
    if prev == 0.0 {
        return None;
    }
    Some((curr - prev) / prev.abs() * 100.0)
}

/// Duplicate keys (possible in externally supplied snapshots) are summed.
fn fold_by_key(aggregates: &[GroupAggregate]) -> BTreeMap<GroupKey, GroupAggregate> {
    let mut folded: BTreeMap<GroupKey, GroupAggregate> = BTreeMap::new();
    for group in aggregates {
        folded
            .entry(group.group_key)
            .and_modify(|existing| {
                existing.positive_total += group.positive_total;
                existing.negative_total += group.negative_total;
                existing.net += group.net;
                existing.count += group.count;
            })
            .or_insert_with(|| group.clone());
    }
    folded
}
