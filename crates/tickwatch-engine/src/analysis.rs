//! The indicator engine: price series in, indicators plus recommendation out.
//!
//! This is pure computation. It never raises to its caller: a series too
//! short for any numeric work yields an explicit insufficient-data outcome,
//! and malformed numeric input yields the same outcome with a distinct
//! reason, so downstream code always gets something it can merge or render.

use serde::{Deserialize, Serialize};
use tickwatch_core::PriceSeries;

use crate::indicators::{daily_change_percent, rsi, sma};

/// Minimum bar count below which no numeric computation is attempted.
pub const MIN_BARS: usize = 10;

/// Moving-average windows (bars): short / medium / long.
pub const SHORT_WINDOW: usize = 20;
pub const MEDIUM_WINDOW: usize = 50;
pub const LONG_WINDOW: usize = 200;

/// RSI period (bars).
pub const RSI_PERIOD: usize = 14;

pub const REASON_INSUFFICIENT_DATA: &str = "insufficient data";
pub const REASON_UNAVAILABLE: &str = "data unavailable";
pub const REASON_ERRONEOUS_DATA: &str = "erroneous price data";
pub const REASON_INSUFFICIENT_TREND: &str = "insufficient trend data";
pub const REASON_BUY_ZONE: &str = "uptrend with favorable entry zone";
pub const REASON_CONFIRMED_UPTREND: &str = "confirmed uptrend";
pub const REASON_OVERBOUGHT_DOWNTREND: &str = "downtrend and overbought";
pub const REASON_BELOW_TREND: &str = "below long-term trend";

/// Rule-based recommendation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Buy,
    Hold,
    Sell,
    Caution,
    Neutral,
}

impl Recommendation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Hold => "hold",
            Self::Sell => "sell",
            Self::Caution => "caution",
            Self::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived technical indicators for one instrument.
///
/// A field is `None` whenever the owning series is too short to support it;
/// sentinel zeros are never used.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub ma_short: Option<f64>,
    pub ma_medium: Option<f64>,
    pub ma_long: Option<f64>,
    pub rsi: Option<f64>,
    pub entry_band: Option<f64>,
    pub exit_band: Option<f64>,
}

/// Full numeric analysis of one price series.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub last_close: f64,
    pub change_percent: f64,
    pub relative_strength: f64,
    pub indicators: IndicatorSet,
    pub recommendation: Recommendation,
    pub reason: &'static str,
}

/// Result of running the indicator engine over one series.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// The series supported numeric computation.
    Computed(Analysis),
    /// Too few bars, or numerically malformed input; `reason` distinguishes.
    Insufficient { reason: &'static str },
}

impl AnalysisOutcome {
    pub fn as_computed(&self) -> Option<&Analysis> {
        match self {
            Self::Computed(analysis) => Some(analysis),
            Self::Insufficient { .. } => None,
        }
    }
}

/// Run the indicator engine.
///
/// `sector_avg_change` is the instrument's sector-average daily change
/// percent from the previous refresh cycle (0.0 when unknown);
/// `adjustment_weight` shifts the suggested entry/exit bands and comes from
/// out-of-scope enrichment collaborators (0.0 when absent).
pub fn analyze(series: &PriceSeries, sector_avg_change: f64, adjustment_weight: f64) -> AnalysisOutcome {
    if series.len() < MIN_BARS {
        return AnalysisOutcome::Insufficient {
            reason: REASON_INSUFFICIENT_DATA,
        };
    }

    let closes: Vec<f64> = series.closes().collect();
    if closes.iter().any(|close| !close.is_finite()) {
        return AnalysisOutcome::Insufficient {
            reason: REASON_ERRONEOUS_DATA,
        };
    }

    let last_close = closes[closes.len() - 1];
    let previous_close = closes[closes.len() - 2];
    let change_percent = daily_change_percent(last_close, previous_close);
    let relative_strength = change_percent - sector_avg_change;

    let ma_short = sma(&closes, SHORT_WINDOW);
    let ma_medium = sma(&closes, MEDIUM_WINDOW);
    let ma_long = sma(&closes, LONG_WINDOW);
    let rsi_value = rsi(&closes, RSI_PERIOD);

    let (recommendation, reason) =
        recommend(last_close, ma_long, rsi_value, relative_strength);

    let weight = adjustment_weight.clamp(-1.0, 1.0);
    let entry_band = last_close * 0.98 * (1.0 + weight);
    let exit_band = last_close * 1.05 * (1.0 + weight);

    if !entry_band.is_finite() || !exit_band.is_finite() || !relative_strength.is_finite() {
        return AnalysisOutcome::Insufficient {
            reason: REASON_ERRONEOUS_DATA,
        };
    }

    AnalysisOutcome::Computed(Analysis {
        last_close,
        change_percent,
        relative_strength,
        indicators: IndicatorSet {
            ma_short,
            ma_medium,
            ma_long,
            rsi: rsi_value,
            entry_band: Some(entry_band),
            exit_band: Some(exit_band),
        },
        recommendation,
        reason,
    })
}

/// The recommendation rule table, first match wins.
fn recommend(
    close: f64,
    ma_long: Option<f64>,
    rsi: Option<f64>,
    relative_strength: f64,
) -> (Recommendation, &'static str) {
    let Some(ma_long) = ma_long else {
        return (Recommendation::Neutral, REASON_INSUFFICIENT_TREND);
    };

    // RSI warms up long before the long MA does, so it is always present
    // here; the midpoint fallback keeps the match exhaustive regardless.
    let rsi = rsi.unwrap_or(50.0);

    if close > ma_long {
        if rsi < 40.0 || relative_strength > 1.5 {
            (Recommendation::Buy, REASON_BUY_ZONE)
        } else {
            (Recommendation::Hold, REASON_CONFIRMED_UPTREND)
        }
    } else if close < ma_long {
        if rsi > 70.0 || relative_strength < -1.5 {
            (Recommendation::Sell, REASON_OVERBOUGHT_DOWNTREND)
        } else {
            (Recommendation::Caution, REASON_BELOW_TREND)
        }
    } else {
        (Recommendation::Hold, REASON_CONFIRMED_UPTREND)
    }
}
