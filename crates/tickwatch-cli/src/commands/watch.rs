use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use tickwatch_core::{InstrumentRegistry, SourceRouter};
use tickwatch_engine::{EngineConfig, MarketView, RefreshOrchestrator, SnapshotStore};

use crate::cli::WatchArgs;
use crate::error::CliError;

pub async fn run(
    args: &WatchArgs,
    router: Arc<SourceRouter>,
    registry: Arc<dyn InstrumentRegistry>,
) -> Result<(), CliError> {
    let config = EngineConfig {
        refresh_interval: Duration::from_secs(args.interval_mins.max(1) * 60),
        worker_count: args.workers.max(1),
        ..EngineConfig::default()
    };

    let store = SnapshotStore::new();
    let view = MarketView::new(store.clone());
    let orchestrator = Arc::new(RefreshOrchestrator::new(router, registry, store, config));

    let engine = tokio::spawn(orchestrator.run());

    tokio::signal::ctrl_c().await?;
    engine.abort();

    let status = view.status();
    info!(
        tracked = status.tracked_count,
        last_refresh = status
            .last_refresh
            .map(|marker| marker.to_string())
            .unwrap_or_else(|| String::from("never")),
        "engine stopped"
    );
    Ok(())
}
