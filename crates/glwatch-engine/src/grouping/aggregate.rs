use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grouping::{GroupKey, GroupingStrategy};
use crate::ledger::types::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
    pub group_key: GroupKey,
    #[serde(default)]
    pub label: String,
    pub positive_total: f64,
    pub negative_total: f64,
    #[serde(default)]
    pub net: f64,
    pub count: i64,
}

impl GroupAggregate {
    pub fn empty(group_key: GroupKey) -> Self {
        Self {
            label: group_key.label(),
            group_key,
            positive_total: 0.0,
            negative_total: 0.0,
            net: 0.0,
            count: 0,
        }
    }

    fn absorb(&mut self, transaction: &Transaction) {
        self.positive_total += transaction.positive_part();
        self.negative_total += transaction.negative_part();
        self.count += 1;
    }

    fn has_activity(&self) -> bool {
        self.positive_total != 0.0 || self.negative_total != 0.0
    }
}

/// Reduces transactions into one aggregate per non-empty group, ordered by
/// group key. `net` is always `positive_total - negative_total`.
pub fn aggregate(transactions: &[Transaction], strategy: &GroupingStrategy) -> Vec<GroupAggregate> {
    let mut groups: BTreeMap<GroupKey, GroupAggregate> = BTreeMap::new();
    for transaction in transactions {
        let key = strategy.group_key(transaction.gl_code);
        groups
            .entry(key)
            .or_insert_with(|| GroupAggregate::empty(key))
            .absorb(transaction);
    }

    let drop_inactive = strategy.drops_inactive_groups();
    let aggregates = groups
        .into_values()
        .filter(|group| !drop_inactive || group.has_activity())
        .map(|mut group| {
            group.net = group.positive_total - group.negative_total;
            group
        })
        .collect::<Vec<GroupAggregate>>();

    debug!(
        grouping = %strategy.describe(),
        groups = aggregates.len(),
        "aggregated transactions"
    );
    aggregates
}
