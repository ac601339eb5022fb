use serde::{Deserialize, Serialize};

use crate::{Symbol, UtcDateTime, ValidationError};

/// A tracked instrument: identity plus the sector it is grouped under.
///
/// Immutable for the lifetime of a process run; sourced from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: Symbol,
    pub name: String,
    pub sector: String,
}

impl Instrument {
    pub fn new(
        symbol: Symbol,
        name: impl Into<String>,
        sector: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let sector = sector.into();
        if sector.trim().is_empty() {
            return Err(ValidationError::EmptySector);
        }
        Ok(Self {
            symbol,
            name: name.into(),
            sector,
        })
    }
}

/// OHLCV bar record for one daily interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

impl Bar {
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Ordered daily bar history for one instrument.
///
/// Bars are strictly ascending by timestamp with no duplicates; the
/// constructor rejects anything else. A series is replaced wholesale on each
/// successful refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: Symbol,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(symbol: Symbol, bars: Vec<Bar>) -> Result<Self, ValidationError> {
        for window in bars.windows(2) {
            if window[1].ts < window[0].ts {
                return Err(ValidationError::UnorderedSeries);
            }
            if window[1].ts == window[0].ts {
                return Err(ValidationError::DuplicateBarTimestamp {
                    value: window[0].ts.format_rfc3339(),
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            bars: Vec::new(),
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|bar| bar.close)
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|bar| bar.close)
    }
}

/// Best-effort per-instrument metadata fetched alongside price history.
///
/// Every field is optional; providers routinely omit some or all of them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstrumentMeta {
    pub currency: Option<String>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub recommendation_key: Option<String>,
}

impl InstrumentMeta {
    pub fn new(
        currency: Option<&str>,
        pe_ratio: Option<f64>,
        dividend_yield: Option<f64>,
        recommendation_key: Option<String>,
    ) -> Result<Self, ValidationError> {
        validate_optional_finite("pe_ratio", pe_ratio)?;
        validate_optional_non_negative("dividend_yield", dividend_yield)?;

        Ok(Self {
            currency: currency.map(validate_currency_code).transpose()?,
            pe_ratio,
            dividend_yield,
            recommendation_key,
        })
    }
}

/// Validate and normalize currency to uppercase 3-letter code.
pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}

fn validate_optional_finite(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
    }
    Ok(())
}
