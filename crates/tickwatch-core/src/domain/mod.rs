mod models;
mod symbol;
mod timestamp;

pub use models::{
    validate_currency_code, Bar, Instrument, InstrumentMeta, PriceSeries,
};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
