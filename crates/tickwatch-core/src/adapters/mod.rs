//! Provider adapters implementing the [`PriceSource`](crate::PriceSource) contract.

mod alphavantage;
mod yahoo;

pub use alphavantage::AlphaVantageAdapter;
pub use yahoo::YahooAdapter;
