//! # Tickwatch Engine
//!
//! The refresh-and-cache core: a periodic orchestrator re-fetches and
//! re-computes derived state for every tracked instrument so that interactive
//! reads never wait on a slow upstream fetch.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`analysis`] | Indicator engine: series in, indicators + recommendation out |
//! | [`error`] | Per-instrument refresh failure taxonomy |
//! | [`indicators`] | Pure SMA/RSI/change math |
//! | [`orchestrator`] | Periodic refresh cycles over a bounded worker pool |
//! | [`resolver`] | Synchronous single-instrument fallback on cache miss |
//! | [`sectors`] | Sector aggregation and ranking |
//! | [`snapshot`] | Snapshot, sector aggregate and heatmap types |
//! | [`store`] | Concurrency-safe snapshot store |
//! | [`view`] | Read API for the out-of-scope front end |
//!
//! ## Data flow
//!
//! ```text
//! Registry ──▶ Orchestrator ──▶ Source Router ──▶ Indicator Engine
//!                  │                                      │
//!                  ▼                                      ▼
//!            Sector Aggregator ◀────────────── Snapshot Store ──▶ readers / Resolver
//! ```
//!
//! The store is the only shared mutable state; everything else is either pure
//! computation or owns its inputs.

pub mod analysis;
pub mod error;
pub mod indicators;
pub mod orchestrator;
pub mod resolver;
pub mod sectors;
pub mod snapshot;
pub mod store;
pub mod view;

pub use analysis::{
    analyze, Analysis, AnalysisOutcome, IndicatorSet, Recommendation, LONG_WINDOW, MEDIUM_WINDOW,
    MIN_BARS, RSI_PERIOD, SHORT_WINDOW,
};
pub use error::RefreshError;
pub use orchestrator::{CycleReport, EngineConfig, RefreshOrchestrator};
pub use resolver::{Resolver, UNTRACKED_SECTOR};
pub use sectors::rank_sectors;
pub use snapshot::{HeatmapCell, SectorAggregate, Snapshot};
pub use store::SnapshotStore;
pub use view::{EngineStatus, MarketView};
