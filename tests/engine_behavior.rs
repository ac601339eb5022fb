//! Behavior-driven tests for the refresh engine.
//!
//! These tests verify HOW the engine behaves across whole cycles: isolation
//! of per-instrument failures, idempotent merges, sector aggregation over a
//! consistent store, and the exposed views.

use std::sync::Arc;
use std::time::Duration;

use tickwatch_core::{Instrument, SourceRouter, StaticRegistry, UtcDateTime};
use tickwatch_engine::{
    EngineConfig, MarketView, Recommendation, RefreshOrchestrator, SnapshotStore,
};
use tickwatch_tests::{
    downtrend_closes, symbol, uptrend_closes, ProviderScript, ScriptedSource,
};

fn instrument(sym: &str, name: &str, sector: &str) -> Instrument {
    Instrument::new(symbol(sym), name, sector).expect("instrument")
}

fn test_config() -> EngineConfig {
    EngineConfig {
        fetch_timeout: Duration::from_millis(500),
        fetch_metadata: false,
        ..EngineConfig::default()
    }
}

fn engine_with(
    scripts: Vec<(&str, ProviderScript)>,
    universe: Vec<Instrument>,
) -> RefreshOrchestrator {
    let source = ScriptedSource::new(
        scripts
            .into_iter()
            .map(|(sym, script)| (symbol(sym), script))
            .collect(),
    );
    RefreshOrchestrator::new(
        Arc::new(SourceRouter::new(vec![Arc::new(source)])),
        Arc::new(StaticRegistry::new(universe)),
        SnapshotStore::new(),
        test_config(),
    )
}

// =============================================================================
// Cycle isolation
// =============================================================================

#[tokio::test]
async fn one_failing_instrument_does_not_block_the_others() {
    let engine = engine_with(
        vec![
            ("A", ProviderScript::Series(uptrend_closes())),
            ("X", ProviderScript::Fail("provider exploded")),
            ("C", ProviderScript::Series(downtrend_closes())),
        ],
        vec![
            instrument("A", "Alpha", "SectorX"),
            instrument("X", "Broken", "SectorX"),
            instrument("C", "Gamma", "SectorY"),
        ],
    );

    let report = engine.run_cycle().await.expect("cycle runs");

    assert_eq!(report.refreshed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].0, symbol("X"));

    let store = engine.store();
    assert!(!store.snapshot(&symbol("A")).expect("A refreshed").is_degenerate());
    assert!(!store.snapshot(&symbol("C")).expect("C refreshed").is_degenerate());
    // The global marker still advances once all outcomes are accounted for.
    assert!(store.last_refresh().is_some());
}

#[tokio::test]
async fn a_hung_fetch_times_out_as_an_ordinary_failure() {
    let engine = engine_with(
        vec![
            ("A", ProviderScript::Series(uptrend_closes())),
            ("H", ProviderScript::Hang),
        ],
        vec![
            instrument("A", "Alpha", "SectorX"),
            instrument("H", "Hung", "SectorX"),
        ],
    );

    let report = engine.run_cycle().await.expect("cycle runs");

    assert_eq!(report.refreshed, 1);
    assert_eq!(report.failed, 1);
    assert!(engine.store().last_refresh().is_some());
}

#[tokio::test]
async fn failed_instrument_retains_its_prior_snapshot() {
    let universe = vec![instrument("A", "Alpha", "SectorX")];

    let engine = engine_with(
        vec![("A", ProviderScript::Series(uptrend_closes()))],
        universe.clone(),
    );
    engine.run_cycle().await.expect("first cycle");
    let before = engine.store().snapshot(&symbol("A")).expect("snapshot");

    // Second engine sharing the store, now with the provider failing.
    let failing = RefreshOrchestrator::new(
        Arc::new(SourceRouter::new(vec![Arc::new(ScriptedSource::new(vec![(
            symbol("A"),
            ProviderScript::Fail("upstream broke"),
        )]))])),
        Arc::new(StaticRegistry::new(universe)),
        engine.store(),
        test_config(),
    );
    let report = failing.run_cycle().await.expect("second cycle");

    assert_eq!(report.failed, 1);
    let after = failing.store().snapshot(&symbol("A")).expect("snapshot");
    assert_eq!(after, before, "prior snapshot must be retained on failure");
}

#[tokio::test]
async fn empty_history_degrades_to_a_placeholder() {
    let engine = engine_with(
        vec![("E", ProviderScript::Empty)],
        vec![instrument("E", "Empty", "SectorX")],
    );

    let report = engine.run_cycle().await.expect("cycle runs");

    assert_eq!(report.failed, 1);
    let snapshot = engine.store().snapshot(&symbol("E")).expect("placeholder");
    assert!(snapshot.is_degenerate());
    assert_eq!(snapshot.recommendation, Recommendation::Neutral);
}

// =============================================================================
// Merge idempotence
// =============================================================================

#[tokio::test]
async fn identical_cycles_leave_snapshots_byte_identical() {
    let engine = engine_with(
        vec![("A", ProviderScript::Series(uptrend_closes()))],
        vec![instrument("A", "Alpha", "SectorX")],
    );
    engine.run_cycle().await.expect("first cycle");
    let first = engine.store().snapshot(&symbol("A")).expect("snapshot");

    // A scripted source returns the same series, but its timestamps shift to
    // "today"; merge on identical content only happens within one day. Drive
    // the same outcome through the store directly instead.
    let (snapshot, series) = engine.store().get(&symbol("A")).expect("entry");
    let mut replay = snapshot.clone();
    replay.updated_at = UtcDateTime::now();
    engine.store().merge(replay, series);

    let second = engine.store().snapshot(&symbol("A")).expect("snapshot");
    assert_eq!(second, first, "re-merging identical content must be a no-op");
    assert_eq!(second.updated_at, first.updated_at);
}

// =============================================================================
// Sector aggregation
// =============================================================================

#[tokio::test]
async fn sector_mean_excludes_invalid_members() {
    let engine = engine_with(
        vec![
            ("A", ProviderScript::Series(uptrend_closes())),
            ("B", ProviderScript::Fail("no data")),
        ],
        vec![
            instrument("A", "Alpha", "SectorX"),
            instrument("B", "Beta", "SectorX"),
        ],
    );

    engine.run_cycle().await.expect("cycle runs");

    let ranking = engine.store().sector_ranking();
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0].sector, "SectorX");
    assert_eq!(ranking[0].member_count, 1);

    let a_change = engine
        .store()
        .snapshot(&symbol("A"))
        .expect("snapshot")
        .change_percent;
    assert!((ranking[0].mean_change_percent - a_change).abs() < 1e-9);
}

#[tokio::test]
async fn sector_averages_feed_the_next_cycle() {
    let universe = vec![instrument("A", "Alpha", "SectorX")];
    let engine = engine_with(
        vec![("A", ProviderScript::Series(uptrend_closes()))],
        universe,
    );

    // First cycle: no sector table yet, relative strength equals raw change.
    engine.run_cycle().await.expect("first cycle");
    let first = engine.store().snapshot(&symbol("A")).expect("snapshot");
    assert!((first.relative_strength - first.change_percent).abs() < 1e-9);

    // Second cycle: the sector table now holds A's own change, so the lagged
    // relative strength collapses to zero.
    engine.run_cycle().await.expect("second cycle");
    let second = engine.store().snapshot(&symbol("A")).expect("snapshot");
    assert!(second.relative_strength.abs() < 1e-9);
}

// =============================================================================
// End-to-end scenario
// =============================================================================

#[tokio::test]
async fn mixed_cycle_produces_expected_views() {
    let engine = engine_with(
        vec![
            ("A", ProviderScript::Series(uptrend_closes())),
            ("B", ProviderScript::Fail("fetch failed")),
            ("C", ProviderScript::Series(downtrend_closes())),
        ],
        vec![
            instrument("A", "Alpha", "SectorX"),
            instrument("B", "Beta", "SectorX"),
            instrument("C", "Gamma", "SectorY"),
        ],
    );

    let report = engine.run_cycle().await.expect("cycle runs");
    assert_eq!(report.refreshed, 2);
    assert_eq!(report.failed, 1);

    let store = engine.store();
    let view = MarketView::new(store.clone());

    // A: above its long MA and outperforming -> Buy.
    let a = store.snapshot(&symbol("A")).expect("A");
    assert_eq!(a.recommendation, Recommendation::Buy);

    // B: failed with no prior data -> zero-price placeholder.
    let b = store.snapshot(&symbol("B")).expect("B");
    assert!(b.is_degenerate());

    // C: below its long MA and underperforming -> Sell.
    let c = store.snapshot(&symbol("C")).expect("C");
    assert_eq!(c.recommendation, Recommendation::Sell);

    // SectorX aggregates A alone; B is excluded as invalid.
    let ranking = view.sector_ranking();
    let sector_x = ranking
        .iter()
        .find(|aggregate| aggregate.sector == "SectorX")
        .expect("SectorX present");
    assert_eq!(sector_x.member_count, 1);
    assert!((sector_x.mean_change_percent - a.change_percent).abs() < 1e-9);

    // The heatmap lists all three symbols, B at zero.
    let heatmap = view.heatmap();
    assert_eq!(heatmap.len(), 3);
    let b_cell = heatmap
        .iter()
        .find(|cell| cell.symbol == symbol("B"))
        .expect("B present");
    assert_eq!(b_cell.change_percent, 0.0);

    // Status reflects the completed cycle.
    let status = view.status();
    assert_eq!(status.tracked_count, 3);
    assert!(status.last_refresh.is_some());
    assert!(!status.is_stale(time::Duration::minutes(20)));
}

// =============================================================================
// Refresh marker
// =============================================================================

#[tokio::test]
async fn refresh_marker_moves_forward_across_cycles() {
    let engine = engine_with(
        vec![("A", ProviderScript::Series(uptrend_closes()))],
        vec![instrument("A", "Alpha", "SectorX")],
    );

    engine.run_cycle().await.expect("first cycle");
    let first = engine.store().last_refresh().expect("marker");

    engine.run_cycle().await.expect("second cycle");
    let second = engine.store().last_refresh().expect("marker");

    assert!(second >= first, "marker must never move backward");
}
