//! Behavior-driven tests for indicator-engine correctness.
//!
//! These tests verify the numeric guarantees the rest of the system leans
//! on: bounded RSI, explicit insufficient-data outcomes, and the guarded
//! daily-change computation.

use tickwatch_engine::analysis::{
    analyze, AnalysisOutcome, Recommendation, REASON_INSUFFICIENT_DATA, REASON_INSUFFICIENT_TREND,
};
use tickwatch_engine::indicators::{daily_change_percent, rsi, sma};
use tickwatch_engine::MIN_BARS;
use tickwatch_tests::{downtrend_closes, series_from_closes, symbol, uptrend_closes};

// =============================================================================
// RSI bounds
// =============================================================================

#[test]
fn rsi_stays_in_bounds_for_any_sufficient_series() {
    let shapes: Vec<Vec<f64>> = vec![
        (0..40).map(|i| 100.0 + i as f64).collect(),
        (0..40).map(|i| 100.0 - i as f64 * 0.5).collect(),
        (0..40).map(|i| 100.0 + ((i % 5) as f64 - 2.0) * 3.0).collect(),
        vec![100.0; 40],
    ];

    for closes in shapes {
        let value = rsi(&closes, 14).expect("series is long enough");
        assert!(
            (0.0..=100.0).contains(&value),
            "RSI {value} escaped [0, 100]"
        );
        assert!(!value.is_nan());
    }
}

#[test]
fn flat_series_rsi_is_one_hundred_not_nan() {
    // Zero average loss is the division hazard; it must clamp to 100.
    let closes = vec![50.0; 30];
    assert_eq!(rsi(&closes, 14), Some(100.0));
}

// =============================================================================
// Insufficient data
// =============================================================================

#[test]
fn series_below_minimum_bars_never_gets_a_numeric_recommendation() {
    for len in 0..MIN_BARS {
        let closes: Vec<f64> = (0..len).map(|i| 100.0 + i as f64).collect();
        let series = series_from_closes(&symbol("MC.PA"), &closes);

        let outcome = analyze(&series, 0.0, 0.0);
        assert_eq!(
            outcome,
            AnalysisOutcome::Insufficient {
                reason: REASON_INSUFFICIENT_DATA
            },
            "series of {len} bars must be insufficient"
        );
    }
}

#[test]
fn unsupported_windows_stay_undefined_rather_than_shortened() {
    // 15 bars: RSI-14 computes, but none of the 20/50/200 windows do.
    let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
    let series = series_from_closes(&symbol("MC.PA"), &closes);

    let outcome = analyze(&series, 0.0, 0.0);
    let analysis = outcome.as_computed().expect("15 bars compute");

    assert_eq!(analysis.indicators.ma_short, None);
    assert_eq!(analysis.indicators.ma_medium, None);
    assert_eq!(analysis.indicators.ma_long, None);
    assert!(analysis.indicators.rsi.is_some());
    assert_eq!(analysis.recommendation, Recommendation::Neutral);
    assert_eq!(analysis.reason, REASON_INSUFFICIENT_TREND);
    assert_eq!(sma(&closes, 20), None);
}

// =============================================================================
// Division guard
// =============================================================================

#[test]
fn zero_previous_close_yields_zero_change() {
    assert_eq!(daily_change_percent(100.0, 0.0), 0.0);

    // Through the full engine as well: a series whose penultimate close is 0.
    let mut closes = vec![1.0; 20];
    closes[18] = 0.0;
    let series = series_from_closes(&symbol("MC.PA"), &closes);

    let analysis = analyze(&series, 0.0, 0.0);
    let analysis = analysis.as_computed().expect("computed");
    assert_eq!(analysis.change_percent, 0.0);
    assert!(!analysis.change_percent.is_nan());
}

// =============================================================================
// Rule-table outcomes end to end
// =============================================================================

#[test]
fn uptrend_with_outperformance_is_a_buy() {
    let series = series_from_closes(&symbol("MC.PA"), &uptrend_closes());
    let outcome = analyze(&series, 0.0, 0.0);
    let analysis = outcome.as_computed().expect("computed");

    let ma_long = analysis.indicators.ma_long.expect("long window supported");
    assert!(analysis.last_close > ma_long);
    assert!(analysis.relative_strength > 1.5);
    assert_eq!(analysis.recommendation, Recommendation::Buy);
}

#[test]
fn downtrend_with_underperformance_is_a_sell() {
    let series = series_from_closes(&symbol("SAN.PA"), &downtrend_closes());
    let outcome = analyze(&series, 0.0, 0.0);
    let analysis = outcome.as_computed().expect("computed");

    let ma_long = analysis.indicators.ma_long.expect("long window supported");
    assert!(analysis.last_close < ma_long);
    assert!(analysis.relative_strength < -1.5);
    assert_eq!(analysis.recommendation, Recommendation::Sell);
}

#[test]
fn sector_average_shifts_relative_strength() {
    let series = series_from_closes(&symbol("MC.PA"), &uptrend_closes());

    let neutral = analyze(&series, 0.0, 0.0);
    let neutral = neutral.as_computed().expect("computed");

    // Same series against a sector that moved just as much: no edge left.
    let matched = analyze(&series, neutral.change_percent, 0.0);
    let matched = matched.as_computed().expect("computed");

    assert!(matched.relative_strength.abs() < 1e-9);
    assert_eq!(matched.recommendation, Recommendation::Hold);
}
