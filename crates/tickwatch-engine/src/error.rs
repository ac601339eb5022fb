use thiserror::Error;
use tickwatch_core::Symbol;

/// Per-instrument refresh failure taxonomy.
///
/// Every variant is recovered locally: a failure degrades one instrument's
/// snapshot (prior value retained, or a zero-price placeholder on first run)
/// and never aborts the enclosing cycle or reaches readers as a panic. There
/// is no intra-cycle retry; the next scheduled cycle is the retry mechanism.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no data available for {symbol}: {reason}")]
    DataUnavailable { symbol: Symbol, reason: String },

    #[error("{symbol} has {got} bars, {need} required for indicators")]
    InsufficientHistory {
        symbol: Symbol,
        got: usize,
        need: usize,
    },

    #[error("computation failed for {symbol}: {reason}")]
    Computation { symbol: Symbol, reason: String },

    #[error("instrument registry unavailable: {reason}")]
    RegistryUnavailable { reason: String },
}

impl RefreshError {
    /// Stable machine-readable code, mirroring the provider error convention.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } => "refresh.data_unavailable",
            Self::InsufficientHistory { .. } => "refresh.insufficient_history",
            Self::Computation { .. } => "refresh.computation",
            Self::RegistryUnavailable { .. } => "refresh.registry_unavailable",
        }
    }
}
