//! Concurrency-safe holder of the latest per-instrument state.
//!
//! One coarse lock guards the whole market state: snapshots, price series,
//! sector aggregates and the global refresh marker. Critical sections are a
//! few map operations and never span an await point. At tens-to-low-hundreds
//! of instruments on a minute-scale cadence this is plenty.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use tickwatch_core::{PriceSeries, Symbol, UtcDateTime};

use crate::snapshot::{SectorAggregate, Snapshot};

#[derive(Debug, Default)]
struct StoreInner {
    snapshots: BTreeMap<Symbol, Snapshot>,
    series: BTreeMap<Symbol, PriceSeries>,
    sector_ranking: Vec<SectorAggregate>,
    sector_averages: HashMap<String, f64>,
    last_refresh: Option<UtcDateTime>,
    scheduler_running: bool,
}

/// Thread-safe store of the latest snapshot and price series per symbol.
///
/// The maps are reachable only through this type; all mutation goes through
/// [`merge`](SnapshotStore::merge) and the sector/marker setters.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot and series for one symbol.
    pub fn get(&self, symbol: &Symbol) -> Option<(Snapshot, PriceSeries)> {
        let inner = self.inner.read().expect("snapshot store lock is not poisoned");
        let snapshot = inner.snapshots.get(symbol)?.clone();
        let series = inner
            .series
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| PriceSeries::empty(symbol.clone()));
        Some((snapshot, series))
    }

    /// Latest snapshot only.
    pub fn snapshot(&self, symbol: &Symbol) -> Option<Snapshot> {
        let inner = self.inner.read().expect("snapshot store lock is not poisoned");
        inner.snapshots.get(symbol).cloned()
    }

    /// Atomically replace the snapshot and price series for one symbol.
    ///
    /// Idempotent: merging identical content again is a no-op and does not
    /// advance the per-instrument update marker.
    pub fn merge(&self, snapshot: Snapshot, series: PriceSeries) {
        let mut inner = self
            .inner
            .write()
            .expect("snapshot store lock is not poisoned");

        if let (Some(existing_snapshot), Some(existing_series)) = (
            inner.snapshots.get(&snapshot.symbol),
            inner.series.get(&snapshot.symbol),
        ) {
            if existing_snapshot.same_content(&snapshot) && *existing_series == series {
                return;
            }
        }

        let symbol = snapshot.symbol.clone();
        inner.snapshots.insert(symbol.clone(), snapshot);
        inner.series.insert(symbol, series);
    }

    /// Read-only copy of every snapshot, taken under one lock acquisition so
    /// sector aggregation observes a consistent set.
    pub fn snapshot_all(&self) -> BTreeMap<Symbol, Snapshot> {
        let inner = self.inner.read().expect("snapshot store lock is not poisoned");
        inner.snapshots.clone()
    }

    /// Number of symbols currently held (refreshed or placeholder).
    pub fn len(&self) -> usize {
        let inner = self.inner.read().expect("snapshot store lock is not poisoned");
        inner.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Install a cycle's sector aggregates, replacing the previous set.
    pub fn set_sector_ranking(&self, ranking: Vec<SectorAggregate>) {
        let mut inner = self
            .inner
            .write()
            .expect("snapshot store lock is not poisoned");
        inner.sector_averages = ranking
            .iter()
            .map(|aggregate| (aggregate.sector.clone(), aggregate.mean_change_percent))
            .collect();
        inner.sector_ranking = ranking;
    }

    /// Ranked sector aggregates from the most recent completed cycle.
    pub fn sector_ranking(&self) -> Vec<SectorAggregate> {
        let inner = self.inner.read().expect("snapshot store lock is not poisoned");
        inner.sector_ranking.clone()
    }

    /// A sector's mean change percent from the most recent completed cycle.
    pub fn sector_average(&self, sector: &str) -> Option<f64> {
        let inner = self.inner.read().expect("snapshot store lock is not poisoned");
        inner.sector_averages.get(sector).copied()
    }

    /// Global refresh marker; `None` until the first cycle completes.
    pub fn last_refresh(&self) -> Option<UtcDateTime> {
        let inner = self.inner.read().expect("snapshot store lock is not poisoned");
        inner.last_refresh
    }

    /// Advance the global refresh marker. The marker only moves forward; a
    /// stale timestamp is ignored.
    pub fn advance_refresh_marker(&self, ts: UtcDateTime) {
        let mut inner = self
            .inner
            .write()
            .expect("snapshot store lock is not poisoned");
        if inner.last_refresh.is_none_or(|current| ts > current) {
            inner.last_refresh = Some(ts);
        }
    }

    pub fn set_scheduler_running(&self, running: bool) {
        let mut inner = self
            .inner
            .write()
            .expect("snapshot store lock is not poisoned");
        inner.scheduler_running = running;
    }

    pub fn is_scheduler_running(&self) -> bool {
        let inner = self.inner.read().expect("snapshot store lock is not poisoned");
        inner.scheduler_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Recommendation;

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("symbol")
    }

    fn ts(value: &str) -> UtcDateTime {
        UtcDateTime::parse(value).expect("timestamp")
    }

    fn placeholder(sym: &str, stamp: &str) -> Snapshot {
        Snapshot::placeholder(symbol(sym), "Sector", ts(stamp))
    }

    #[test]
    fn get_returns_merged_content() {
        let store = SnapshotStore::new();
        assert!(store.get(&symbol("MC.PA")).is_none());

        let snapshot = placeholder("MC.PA", "2024-01-01T00:00:00Z");
        store.merge(snapshot.clone(), PriceSeries::empty(symbol("MC.PA")));

        let (fetched, series) = store.get(&symbol("MC.PA")).expect("entry");
        assert_eq!(fetched, snapshot);
        assert!(series.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn merge_with_identical_content_keeps_update_marker() {
        let store = SnapshotStore::new();
        let first = placeholder("MC.PA", "2024-01-01T00:00:00Z");
        store.merge(first.clone(), PriceSeries::empty(symbol("MC.PA")));

        let mut second = first.clone();
        second.updated_at = ts("2024-06-01T00:00:00Z");
        store.merge(second, PriceSeries::empty(symbol("MC.PA")));

        let fetched = store.snapshot(&symbol("MC.PA")).expect("snapshot");
        assert_eq!(fetched.updated_at, ts("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn merge_with_changed_content_replaces_snapshot() {
        let store = SnapshotStore::new();
        let first = placeholder("MC.PA", "2024-01-01T00:00:00Z");
        store.merge(first.clone(), PriceSeries::empty(symbol("MC.PA")));

        let mut second = first;
        second.last_price = 123.0;
        second.recommendation = Recommendation::Hold;
        second.updated_at = ts("2024-06-01T00:00:00Z");
        store.merge(second.clone(), PriceSeries::empty(symbol("MC.PA")));

        let fetched = store.snapshot(&symbol("MC.PA")).expect("snapshot");
        assert_eq!(fetched, second);
    }

    #[test]
    fn refresh_marker_never_moves_backward() {
        let store = SnapshotStore::new();
        assert_eq!(store.last_refresh(), None);

        store.advance_refresh_marker(ts("2024-02-01T00:00:00Z"));
        store.advance_refresh_marker(ts("2024-01-01T00:00:00Z"));

        assert_eq!(store.last_refresh(), Some(ts("2024-02-01T00:00:00Z")));
    }

    #[test]
    fn sector_ranking_updates_average_table() {
        let store = SnapshotStore::new();
        assert_eq!(store.sector_average("Luxury"), None);

        store.set_sector_ranking(vec![
            SectorAggregate {
                sector: String::from("Luxury"),
                mean_change_percent: 1.25,
                member_count: 2,
            },
            SectorAggregate {
                sector: String::from("Health"),
                mean_change_percent: -0.5,
                member_count: 1,
            },
        ]);

        assert_eq!(store.sector_average("Luxury"), Some(1.25));
        assert_eq!(store.sector_average("Health"), Some(-0.5));
        assert_eq!(store.sector_average("Energy"), None);
        assert_eq!(store.sector_ranking().len(), 2);
    }

    #[test]
    fn snapshot_all_copies_every_entry() {
        let store = SnapshotStore::new();
        store.merge(
            placeholder("MC.PA", "2024-01-01T00:00:00Z"),
            PriceSeries::empty(symbol("MC.PA")),
        );
        store.merge(
            placeholder("SAN.PA", "2024-01-01T00:00:00Z"),
            PriceSeries::empty(symbol("SAN.PA")),
        );

        let all = store.snapshot_all();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key(&symbol("MC.PA")));
        assert!(all.contains_key(&symbol("SAN.PA")));
    }
}
