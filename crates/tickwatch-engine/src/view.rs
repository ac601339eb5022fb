//! Read API exposed to the request/response front end.

use serde::{Deserialize, Serialize};
use tickwatch_core::{Symbol, UtcDateTime};

use crate::snapshot::{HeatmapCell, SectorAggregate, Snapshot};
use crate::store::SnapshotStore;

/// Engine health summary for status pages and external watchdogs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub scheduler_running: bool,
    pub last_refresh: Option<UtcDateTime>,
    pub tracked_count: usize,
}

impl EngineStatus {
    /// True when no cycle has completed within `threshold`. An engine that
    /// has never refreshed is always stale.
    pub fn is_stale(&self, threshold: time::Duration) -> bool {
        match self.last_refresh {
            Some(marker) => marker.age() > threshold,
            None => true,
        }
    }
}

/// Cheap cloneable read handle over the snapshot store.
#[derive(Debug, Clone)]
pub struct MarketView {
    store: SnapshotStore,
}

impl MarketView {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store }
    }

    /// Latest snapshot for one symbol; `None` for symbols the engine has
    /// never seen (callers fall through to the resolver).
    pub fn snapshot(&self, symbol: &Symbol) -> Option<Snapshot> {
        self.store.snapshot(symbol)
    }

    /// Sector ranking from the most recent completed cycle, best first.
    pub fn sector_ranking(&self) -> Vec<SectorAggregate> {
        self.store.sector_ranking()
    }

    /// One row per known instrument, placeholders included at zero, ordered
    /// by symbol.
    pub fn heatmap(&self) -> Vec<HeatmapCell> {
        self.store
            .snapshot_all()
            .into_values()
            .map(|snapshot| HeatmapCell::new(snapshot.symbol.clone(), snapshot.change_percent))
            .collect()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            scheduler_running: self.store.is_scheduler_running(),
            last_refresh: self.store.last_refresh(),
            tracked_count: self.store.len(),
        }
    }
}
