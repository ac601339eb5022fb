//! Synchronous single-instrument fallback for cache misses.
//!
//! Readers land here when the snapshot store has no entry (or only a
//! zero-price placeholder) for a requested symbol, typically one outside the
//! tracked universe. The resolver performs one fetch + compute outside the
//! periodic cycle and hands the snapshot straight back; the store write-back
//! is opportunistic and never blocks the read path.

use std::sync::Arc;

use tracing::debug;

use tickwatch_core::{
    HistoryRequest, Instrument, SourceRouter, SourceStrategy, Symbol, UtcDateTime,
};

use crate::analysis::analyze;
use crate::error::RefreshError;
use crate::orchestrator::EngineConfig;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

/// Sector assigned to symbols resolved outside the tracked universe; no
/// cross-instrument context exists for them.
pub const UNTRACKED_SECTOR: &str = "Other";

pub struct Resolver {
    router: Arc<SourceRouter>,
    store: SnapshotStore,
    config: EngineConfig,
}

impl Resolver {
    pub fn new(router: Arc<SourceRouter>, store: SnapshotStore, config: EngineConfig) -> Self {
        Self {
            router,
            store,
            config,
        }
    }

    /// Resolve one symbol, preferring the cache.
    ///
    /// A cached non-degenerate snapshot is returned as-is. Otherwise a single
    /// fetch + indicator run happens inline, with a neutral (zero) sector
    /// average since no sector context is available for on-demand symbols.
    ///
    /// # Errors
    ///
    /// [`RefreshError::DataUnavailable`] when the fetch fails or times out;
    /// the error never propagates as a panic.
    pub async fn resolve(&self, symbol: &Symbol) -> Result<Snapshot, RefreshError> {
        let cached = self.store.snapshot(symbol);
        if let Some(snapshot) = &cached {
            if !snapshot.is_degenerate() {
                return Ok(snapshot.clone());
            }
        }
        debug!(%symbol, "cache miss, resolving on demand");

        let request = HistoryRequest::new(symbol.clone(), self.config.lookback);
        let routed = tokio::time::timeout(
            self.config.fetch_timeout,
            self.router.route_history(&request, SourceStrategy::Auto),
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
                symbol: symbol.clone(),
                reason: String::from("provider returned empty history"),
            });
        }

        let sector = cached
            .map(|snapshot| snapshot.sector)
            .unwrap_or_else(|| UNTRACKED_SECTOR.to_owned());
        let instrument = Instrument::new(symbol.clone(), symbol.as_str(), sector).map_err(|e| {
            RefreshError::Computation {
                symbol: symbol.clone(),
                reason: e.to_string(),
            }
        })?;

        let outcome = analyze(&series, 0.0, self.config.adjustment_weight);
        let snapshot =
            Snapshot::from_series(&instrument, &series, &outcome, None, UtcDateTime::now());

        // Opportunistic write-back for subsequent readers.
        let store = self.store.clone();
        let write_back = snapshot.clone();
        tokio::spawn(async move {
            store.merge(write_back, series);
        });

        Ok(snapshot)
    }
}
