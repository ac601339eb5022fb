//! The periodic refresh orchestrator.
//!
//! One cycle walks the tracked universe: fetch a bounded history window per
//! instrument through the source router, run the indicator engine, merge into
//! the snapshot store. Instruments are refreshed independently across a small
//! worker pool; one instrument failing never touches the others. After every
//! merge of the cycle has landed, sectors are re-aggregated once and the
//! global refresh marker advances.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tickwatch_core::{
    fallback_universe, FetchPacer, HistoryRequest, Instrument, InstrumentRegistry, Lookback,
    MetadataRequest, PriceSeries, SourceRouter, SourceStrategy, Symbol, UtcDateTime,
};

use crate::analysis::{analyze, AnalysisOutcome, MIN_BARS, REASON_ERRONEOUS_DATA};
use crate::error::RefreshError;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use crate::sectors::rank_sectors;

/// Tunables for the refresh engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Gap between scheduled refresh cycles.
    pub refresh_interval: Duration,
    /// Per-fetch deadline; expiry is an ordinary per-instrument failure.
    pub fetch_timeout: Duration,
    /// Concurrent fetch workers per cycle.
    pub worker_count: usize,
    /// History window requested per instrument.
    pub lookback: Lookback,
    /// Whether to fetch best-effort metadata alongside history.
    pub fetch_metadata: bool,
    /// External adjustment weight applied to entry/exit bands.
    pub adjustment_weight: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(20 * 60),
            fetch_timeout: Duration::from_secs(20),
            worker_count: 5,
            lookback: Lookback::OneYear,
            fetch_metadata: true,
            adjustment_weight: 0.0,
        }
    }
}

/// Outcome accounting for one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub refreshed: usize,
    pub failed: usize,
    pub failures: Vec<(Symbol, RefreshError)>,
    pub completed_at: UtcDateTime,
}

/// Owner of the single refresh loop.
///
/// A cycle-in-progress guard serializes the startup run against the periodic
/// timer: whichever trigger fires while a cycle is still in flight is skipped
/// with a warning instead of interleaving merges.
pub struct RefreshOrchestrator {
    router: Arc<SourceRouter>,
    registry: Arc<dyn InstrumentRegistry>,
    store: SnapshotStore,
    pacer: FetchPacer,
    config: EngineConfig,
    cycle_guard: Mutex<()>,
}

impl RefreshOrchestrator {
    pub fn new(
        router: Arc<SourceRouter>,
        registry: Arc<dyn InstrumentRegistry>,
        store: SnapshotStore,
        config: EngineConfig,
    ) -> Self {
        Self {
            router,
            registry,
            store,
            pacer: FetchPacer::default_market_data(),
            config,
            cycle_guard: Mutex::new(()),
        }
    }

    pub fn store(&self) -> SnapshotStore {
        self.store.clone()
    }

    /// Run the scheduling loop: one cycle immediately, then one per interval.
    ///
    /// Runs until the owning task is dropped or aborted.
    pub async fn run(self: Arc<Self>) {
        self.store.set_scheduler_running(true);
        let mut ticker = tokio::time::interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// Execute one refresh cycle over the whole tracked universe.
    ///
    /// Returns `None` when another cycle is already in flight.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            warn!("refresh cycle still in flight, skipping trigger");
            return None;
        };

        let cycle_id = Uuid::new_v4();
        let instruments = self.tracked_universe();
        info!(%cycle_id, instruments = instruments.len(), "refresh cycle started");

        let semaphore = Arc::new(Semaphore::new(self.config.worker_count.max(1)));
        let mut tasks = tokio::task::JoinSet::new();

        for instrument in instruments {
            let semaphore = semaphore.clone();
            let router = self.router.clone();
            let store = self.store.clone();
            let pacer = self.pacer.clone();
            let config = self.config;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("worker semaphore is never closed");
                tokio::time::sleep(pacer.dispatch_delay()).await;
                pacer.acquire().await;

                let result = refresh_instrument(&router, &store, config, &instrument).await;
                (instrument, result)
            });
        }

        let mut refreshed = 0_usize;
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => refreshed += 1,
                Ok((instrument, Err(error))) => {
                    warn!(%cycle_id, symbol = %instrument.symbol, %error, "instrument refresh failed");
                    self.degrade(&instrument);
                    failures.push((instrument.symbol, error));
                }
                Err(join_error) => {
                    // A panicking worker counts as a failed instrument but
                    // must not sink the cycle.
                    warn!(%cycle_id, %join_error, "refresh worker aborted");
                }
            }
        }

        let ranking = rank_sectors(&self.store.snapshot_all());
        debug!(%cycle_id, sectors = ranking.len(), "sector aggregation complete");
        self.store.set_sector_ranking(ranking);

        let completed_at = UtcDateTime::now();
        self.store.advance_refresh_marker(completed_at);

        let report = CycleReport {
            cycle_id,
            refreshed,
            failed: failures.len(),
            failures,
            completed_at,
        };
        info!(
            %cycle_id,
            refreshed = report.refreshed,
            failed = report.failed,
            "refresh cycle complete"
        );
        Some(report)
    }

    fn tracked_universe(&self) -> Vec<Instrument> {
        match self.registry.list_tracked() {
            Ok(instruments) => instruments,
            Err(error) => {
                let error = RefreshError::RegistryUnavailable {
                    reason: error.to_string(),
                };
                warn!(%error, "falling back to built-in universe");
                fallback_universe()
            }
        }
    }

    /// Leave the prior snapshot in place, or install a zero-price placeholder
    /// for an instrument that has never been fetched successfully.
    fn degrade(&self, instrument: &Instrument) {
        if self.store.snapshot(&instrument.symbol).is_none() {
            self.store.merge(
                Snapshot::placeholder(
                    instrument.symbol.clone(),
                    instrument.sector.clone(),
                    UtcDateTime::now(),
                ),
                PriceSeries::empty(instrument.symbol.clone()),
            );
        }
    }
}

/// Fetch, analyze and merge one instrument.
async fn refresh_instrument(
    router: &SourceRouter,
    store: &SnapshotStore,
    config: EngineConfig,
    instrument: &Instrument,
) -> Result<(), RefreshError> {
    let symbol = instrument.symbol.clone();
    let request = HistoryRequest::new(symbol.clone(), config.lookback);

    let routed = tokio::time::timeout(
        config.fetch_timeout,
        router.route_history(&request, SourceStrategy::Auto),
    )
    .await
    .map_err(|_| RefreshError::DataUnavailable {
        symbol: symbol.clone(),
        reason: String::from("history fetch timed out"),
    })?
    .map_err(|failure| RefreshError::DataUnavailable {
        symbol: symbol.clone(),
        reason: failure
            .last_error()
            .map(|error| error.to_string())
            .unwrap_or_else(|| String::from("all sources failed")),
    })?;

    let series = routed.data;
    if series.is_empty() {
        return Err(RefreshError::DataUnavailable {
            symbol,
            reason: String::from("provider returned empty history"),
        });
    }
    if series.len() < MIN_BARS {
        return Err(RefreshError::InsufficientHistory {
            symbol,
            got: series.len(),
            need: MIN_BARS,
        });
    }

    // Sector input is last cycle's average; the current cycle's aggregate
    // cannot exist until every member has been fetched.
    let sector_avg = store.sector_average(&instrument.sector).unwrap_or(0.0);
    let outcome = analyze(&series, sector_avg, config.adjustment_weight);
    if let AnalysisOutcome::Insufficient { reason } = &outcome {
        if *reason == REASON_ERRONEOUS_DATA {
            return Err(RefreshError::Computation {
                symbol,
                reason: (*reason).to_owned(),
            });
        }
    }

    let meta = if config.fetch_metadata {
        fetch_metadata(router, config, &symbol).await
    } else {
        None
    };
    let prior_meta = store.snapshot(&symbol).and_then(|snapshot| snapshot.meta);

    let snapshot = Snapshot::from_series(
        instrument,
        &series,
        &outcome,
        meta.or(prior_meta),
        UtcDateTime::now(),
    );
    store.merge(snapshot, series);
    Ok(())
}

/// Best-effort metadata fetch; a failure here never degrades the snapshot.
async fn fetch_metadata(
    router: &SourceRouter,
    config: EngineConfig,
    symbol: &Symbol,
) -> Option<tickwatch_core::InstrumentMeta> {
    let request = MetadataRequest::new(symbol.clone());
    match tokio::time::timeout(
        config.fetch_timeout,
        router.route_metadata(&request, SourceStrategy::Auto),
    )
    .await
    {
        Ok(Ok(routed)) => Some(routed.data),
        Ok(Err(failure)) => {
            debug!(
                %symbol,
                reason = failure
                    .last_error()
                    .map(|error| error.to_string())
                    .unwrap_or_default(),
                "metadata fetch failed"
            );
            None
        }
        Err(_) => {
            debug!(%symbol, "metadata fetch timed out");
            None
        }
    }
}
