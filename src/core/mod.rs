//! Core types, configuration and error handling

pub mod config;
pub mod dates;
pub mod error;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use dates::DateWindow;
pub use error::FxError;
pub use rates::{CurrencyDirectory, CurrencyEntry, ExchangeSnapshot, RateSource, TimeSeries};
