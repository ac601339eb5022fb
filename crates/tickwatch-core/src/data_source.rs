//! Price source trait and request/response types.
//!
//! This module defines the adapter contract (`PriceSource`) that all provider
//! implementations follow, along with the request types for each call.
//!
//! # Calls
//!
//! | Call | Request | Response | Description |
//! |------|---------|----------|-------------|
//! | History | [`HistoryRequest`] | [`PriceSeries`] | Daily OHLCV history over a bounded lookback |
//! | Metadata | [`MetadataRequest`] | [`InstrumentMeta`] | Currency, P/E, dividend yield, analyst key |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{InstrumentMeta, PriceSeries, Symbol, ValidationError};

/// Canonical provider identifiers used in routing and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Yahoo,
    Alphavantage,
}

impl ProviderId {
    pub const ALL: [Self; 2] = [Self::Yahoo, Self::Alphavantage];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Alphavantage => "alphavantage",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "alphavantage" => Ok(Self::Alphavantage),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Bounded history window requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lookback {
    OneMonth,
    SixMonths,
    OneYear,
}

impl Lookback {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
        }
    }

    /// Upper bound on the number of daily bars a window can hold.
    pub const fn max_bars(self) -> usize {
        match self {
            Self::OneMonth => 23,
            Self::SixMonths => 130,
            Self::OneYear => 260,
        }
    }
}

impl FromStr for Lookback {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1mo" => Ok(Self::OneMonth),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            other => Err(ValidationError::InvalidLookback {
                value: other.to_owned(),
            }),
        }
    }
}

/// Supported call matrix for a price source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub history: bool,
    pub metadata: bool,
}

impl CapabilitySet {
    pub const fn new(history: bool, metadata: bool) -> Self {
        Self { history, metadata }
    }

    pub const fn full() -> Self {
        Self::new(true, true)
    }
}

/// Health state used by source scoring and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Runtime source health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub rate_available: bool,
    /// Provider score component used by automatic routing.
    pub score: u16,
}

impl HealthStatus {
    pub const fn new(state: HealthState, rate_available: bool, score: u16) -> Self {
        Self {
            state,
            rate_available,
            score,
        }
    }

    pub const fn healthy(score: u16) -> Self {
        Self::new(HealthState::Healthy, true, score)
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    UnsupportedCall,
    Unavailable,
    RateLimited,
    InvalidRequest,
    Internal,
}

/// Structured source error used by router fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unsupported_call(call: &str) -> Self {
        Self {
            kind: SourceErrorKind::UnsupportedCall,
            message: format!("call '{call}' is not supported by this source"),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::UnsupportedCall => "source.unsupported_call",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Request payload for history calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: Symbol,
    pub lookback: Lookback,
}

impl HistoryRequest {
    pub fn new(symbol: Symbol, lookback: Lookback) -> Self {
        Self { symbol, lookback }
    }
}

/// Request payload for metadata calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub symbol: Symbol,
}

impl MetadataRequest {
    pub fn new(symbol: Symbol) -> Self {
        Self { symbol }
    }
}

/// Price source adapter contract.
///
/// All upstream providers implement this trait to be used with the router.
/// Methods return boxed futures so the trait stays object-safe.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; adapters are shared across the
/// orchestrator's worker tasks.
pub trait PriceSource: Send + Sync {
    /// Returns the unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Returns the set of supported calls.
    fn capabilities(&self) -> CapabilitySet;

    /// Fetches daily OHLCV history over the requested lookback.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the call is unsupported, the provider is
    /// unavailable or rate limited, or the response cannot be normalized.
    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>>;

    /// Fetches best-effort instrument metadata.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] under the same conditions as
    /// [`history`](PriceSource::history).
    fn metadata<'a>(
        &'a self,
        req: MetadataRequest,
    ) -> Pin<Box<dyn Future<Output = Result<InstrumentMeta, SourceError>> + Send + 'a>>;

    /// Returns the current health status of this source.
    ///
    /// Used by the router for candidate ordering and fallback decisions.
    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>>;
}
