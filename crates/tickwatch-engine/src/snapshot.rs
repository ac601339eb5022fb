use serde::{Deserialize, Serialize};
use tickwatch_core::{Instrument, InstrumentMeta, PriceSeries, Symbol, UtcDateTime};

use crate::analysis::{AnalysisOutcome, IndicatorSet, Recommendation, REASON_UNAVAILABLE};
use crate::indicators::daily_change_percent;

/// Current derived state for one instrument.
///
/// A snapshot is created whole by one indicator-engine run (or as an explicit
/// placeholder) and replaced whole on merge; readers never observe a
/// half-updated mix of two computations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: Symbol,
    pub sector: String,
    pub last_price: f64,
    pub change_percent: f64,
    pub relative_strength: f64,
    pub indicators: IndicatorSet,
    pub recommendation: Recommendation,
    pub reason: String,
    pub meta: Option<InstrumentMeta>,
    pub updated_at: UtcDateTime,
}

impl Snapshot {
    /// Build a snapshot from a fetched series and an indicator-engine outcome.
    ///
    /// Price and daily change come straight from the series (guarded), so even
    /// an insufficient-data outcome still yields a renderable price.
    pub fn from_series(
        instrument: &Instrument,
        series: &PriceSeries,
        outcome: &AnalysisOutcome,
        meta: Option<InstrumentMeta>,
        updated_at: UtcDateTime,
    ) -> Self {
        let bars = series.bars();
        let last_price = series.last_close().unwrap_or(0.0);
        let change_percent = if bars.len() >= 2 {
            daily_change_percent(bars[bars.len() - 1].close, bars[bars.len() - 2].close)
        } else {
            0.0
        };

        match outcome {
            AnalysisOutcome::Computed(analysis) => Self {
                symbol: instrument.symbol.clone(),
                sector: instrument.sector.clone(),
                last_price: analysis.last_close,
                change_percent: analysis.change_percent,
                relative_strength: analysis.relative_strength,
                indicators: analysis.indicators,
                recommendation: analysis.recommendation,
                reason: analysis.reason.to_owned(),
                meta,
                updated_at,
            },
            AnalysisOutcome::Insufficient { reason } => Self {
                symbol: instrument.symbol.clone(),
                sector: instrument.sector.clone(),
                last_price,
                change_percent,
                relative_strength: 0.0,
                indicators: IndicatorSet::default(),
                recommendation: Recommendation::Neutral,
                reason: (*reason).to_owned(),
                meta,
                updated_at,
            },
        }
    }

    /// Zero-price placeholder merged when an instrument has never been
    /// successfully fetched. Excluded from sector aggregation; shown as a
    /// zero-valued row in the heatmap.
    pub fn placeholder(symbol: Symbol, sector: impl Into<String>, updated_at: UtcDateTime) -> Self {
        Self {
            symbol,
            sector: sector.into(),
            last_price: 0.0,
            change_percent: 0.0,
            relative_strength: 0.0,
            indicators: IndicatorSet::default(),
            recommendation: Recommendation::Neutral,
            reason: REASON_UNAVAILABLE.to_owned(),
            meta: None,
            updated_at,
        }
    }

    /// True for entries with no usable price this run.
    pub fn is_degenerate(&self) -> bool {
        self.last_price == 0.0
    }

    /// Equality over everything except the update marker. Used by the store
    /// to keep merges idempotent.
    pub fn same_content(&self, other: &Self) -> bool {
        self.symbol == other.symbol
            && self.sector == other.sector
            && self.last_price == other.last_price
            && self.change_percent == other.change_percent
            && self.relative_strength == other.relative_strength
            && self.indicators == other.indicators
            && self.recommendation == other.recommendation
            && self.reason == other.reason
            && self.meta == other.meta
    }
}

/// Mean daily change percent across the valid members of one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAggregate {
    pub sector: String,
    pub mean_change_percent: f64,
    pub member_count: usize,
}

/// One row of the exposed heatmap view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub symbol: Symbol,
    pub change_percent: f64,
    /// Display intensity: saturates at a 5% move.
    pub intensity: f64,
}

impl HeatmapCell {
    pub fn new(symbol: Symbol, change_percent: f64) -> Self {
        let intensity = (change_percent.abs() * 20.0).min(100.0);
        Self {
            symbol,
            change_percent,
            intensity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("symbol")
    }

    #[test]
    fn placeholder_is_degenerate_and_neutral() {
        let snapshot = Snapshot::placeholder(symbol("MC.PA"), "Luxury", UtcDateTime::now());
        assert!(snapshot.is_degenerate());
        assert_eq!(snapshot.recommendation, Recommendation::Neutral);
        assert_eq!(snapshot.change_percent, 0.0);
        assert_eq!(snapshot.indicators, IndicatorSet::default());
    }

    #[test]
    fn same_content_ignores_update_marker() {
        let first = Snapshot::placeholder(
            symbol("MC.PA"),
            "Luxury",
            UtcDateTime::parse("2024-01-01T00:00:00Z").expect("ts"),
        );
        let mut second = first.clone();
        second.updated_at = UtcDateTime::parse("2024-06-01T00:00:00Z").expect("ts");

        assert!(first.same_content(&second));

        second.last_price = 10.0;
        assert!(!first.same_content(&second));
    }

    #[test]
    fn heatmap_intensity_saturates_at_five_percent() {
        let moderate = HeatmapCell::new(symbol("MC.PA"), 2.5);
        assert!((moderate.intensity - 50.0).abs() < 1e-9);

        let extreme = HeatmapCell::new(symbol("SAN.PA"), -8.0);
        assert!((extreme.intensity - 100.0).abs() < 1e-9);
    }
}
