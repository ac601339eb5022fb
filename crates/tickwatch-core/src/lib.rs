//! # Tickwatch Core
//!
//! Domain contracts and provider plumbing for the tickwatch market engine.
//!
//! ## Overview
//!
//! This crate provides the foundational components for tickwatch:
//!
//! - **Canonical domain models** for instruments, bars, price series and metadata
//! - **Provider identifiers** for multi-adapter support
//! - **Price source trait** implemented by provider adapters
//! - **Routing logic** for source selection and fallback
//! - **Circuit breaker and pacing** for resilient upstream calls
//! - **Instrument registry** input with a hardcoded fallback universe
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Yahoo, Alpha Vantage) |
//! | [`circuit_breaker`] | Circuit breaker for resilient calls |
//! | [`data_source`] | Price source trait and request types |
//! | [`domain`] | Domain models (Instrument, Bar, PriceSeries, InstrumentMeta) |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`pacing`] | Rate budget and dispatch jitter |
//! | [`registry`] | Tracked-instrument registry input |
//! | [`routing`] | Source routing and selection |
//!
//! ## Error Handling
//!
//! All operations return `Result` types with structured errors:
//!
//! ```rust
//! use tickwatch_core::{SourceError, SourceErrorKind};
//!
//! fn handle_error(error: SourceError) {
//!     match error.kind() {
//!         SourceErrorKind::RateLimited => {
//!             // Wait for the next cycle
//!         }
//!         SourceErrorKind::Unavailable => {
//!             // Try a fallback source
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys are read from environment variables only (never logged)
//! - Input validation on all domain types

pub mod adapters;
pub mod circuit_breaker;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod pacing;
pub mod registry;
pub mod routing;

// Re-export commonly used types at crate root for convenience

// Adapter implementations
pub use adapters::{AlphaVantageAdapter, YahooAdapter};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Data source trait and types
pub use data_source::{
    CapabilitySet, HealthState, HealthStatus, HistoryRequest, Lookback, MetadataRequest,
    PriceSource, ProviderId, SourceError, SourceErrorKind,
};

// Domain models
pub use domain::{
    validate_currency_code, Bar, Instrument, InstrumentMeta, PriceSeries, Symbol, UtcDateTime,
};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};

// Pacing
pub use pacing::FetchPacer;

// Registry
pub use registry::{
    fallback_universe, FileRegistry, InstrumentRegistry, RegistryError, StaticRegistry,
};

// Routing types
pub use routing::{
    RouteFailure, RouteResult, RouteSuccess, SourceRouter, SourceRouterBuilder, SourceStrategy,
};
