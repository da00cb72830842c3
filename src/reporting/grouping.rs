use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::db::repository::EntryFact;
use crate::indicators::percentage;

/// Compliance counts for one grouping key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceGroup<K> {
    pub key: K,
    pub total: u32,
    pub compliant: u32,
    pub percentage: f64,
}

impl<K> ComplianceGroup<K> {
    pub fn non_compliant(&self) -> u32 {
        self.total - self.compliant
    }
}

/// Group facts by `key_fn`, returned in ascending key order.
pub fn group_by<K, F>(facts: &[EntryFact], key_fn: F) -> Vec<ComplianceGroup<K>>
where
    K: Ord,
    F: Fn(&EntryFact) -> K,
{
    let mut buckets: BTreeMap<K, (u32, u32)> = BTreeMap::new();
    for fact in facts {
        let slot = buckets.entry(key_fn(fact)).or_insert((0, 0));
        slot.0 += 1;
        if fact.compliant {
            slot.1 += 1;
        }
    }
    buckets
        .into_iter()
        .map(|(key, (total, compliant))| ComplianceGroup {
            key,
            total,
            compliant,
            percentage: percentage(compliant, total),
        })
        .collect()
}

/// (area, stage, item) key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub area: String,
    pub stage: crate::models::Stage,
    pub item: String,
}

/// (area, shift) key; field order gives area-then-shift sorting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShiftAreaKey {
    pub area: String,
    pub shift: crate::models::Shift,
}

/// (area, stage) key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaStageKey {
    pub area: String,
    pub stage: crate::models::Stage,
}
