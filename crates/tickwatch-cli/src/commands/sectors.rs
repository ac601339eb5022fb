use std::sync::Arc;

use serde::Serialize;

use tickwatch_core::{InstrumentRegistry, SourceRouter};
use tickwatch_engine::{
    EngineConfig, HeatmapCell, MarketView, RefreshOrchestrator, SectorAggregate, SnapshotStore,
};

use crate::cli::{Cli, SectorsArgs};
use crate::commands::print_json;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct SectorsOutput {
    ranking: Vec<SectorAggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    heatmap: Option<Vec<HeatmapCell>>,
}

pub async fn run(
    args: &SectorsArgs,
    cli: &Cli,
    router: Arc<SourceRouter>,
    registry: Arc<dyn InstrumentRegistry>,
) -> Result<(), CliError> {
    let store = SnapshotStore::new();
    let view = MarketView::new(store.clone());
    let orchestrator =
        RefreshOrchestrator::new(router, registry, store, EngineConfig::default());

    orchestrator.run_cycle().await;

    let output = SectorsOutput {
        ranking: view.sector_ranking(),
        heatmap: args.heatmap.then(|| view.heatmap()),
    };
    print_json(&output, cli.pretty)
}
