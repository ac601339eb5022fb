//! Sector aggregation over a consistent snapshot of the store.
//!
//! Recomputed whole once per refresh cycle, never patched incrementally. A
//! sector whose members all failed this run is omitted rather than reported
//! as 0%.

use std::collections::BTreeMap;

use tickwatch_core::Symbol;

use crate::snapshot::{SectorAggregate, Snapshot};

/// Group valid (nonzero-price) snapshots by sector, average their daily
/// change percent, and rank descending by that mean.
pub fn rank_sectors(snapshots: &BTreeMap<Symbol, Snapshot>) -> Vec<SectorAggregate> {
    let mut groups: BTreeMap<&str, (f64, usize)> = BTreeMap::new();

    for snapshot in snapshots.values() {
        if snapshot.is_degenerate() {
            continue;
        }
        let entry = groups.entry(snapshot.sector.as_str()).or_insert((0.0, 0));
        entry.0 += snapshot.change_percent;
        entry.1 += 1;
    }

    let mut ranking: Vec<SectorAggregate> = groups
        .into_iter()
        .map(|(sector, (total, count))| SectorAggregate {
            sector: sector.to_owned(),
            mean_change_percent: total / count as f64,
            member_count: count,
        })
        .collect();

    ranking.sort_by(|left, right| {
        right
            .mean_change_percent
            .partial_cmp(&left.mean_change_percent)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| left.sector.cmp(&right.sector))
    });

    ranking
}
