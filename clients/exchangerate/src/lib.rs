//! HTTP clients for public exchange rate providers.
//!
//! Each client normalizes its provider's response shape into
//! [`QuoteRates`] (live) or a date-ordered [`DailyRate`] series (historical).

mod config;
mod error;
mod exchangerate_api;
mod frankfurter;
mod open_er_api;
mod provider;
mod types;
mod utils;

pub use config::{
    ExchangeRateClientConfig, EXCHANGERATE_API_BASE_URL, FRANKFURTER_BASE_URL,
    OPEN_ER_API_BASE_URL,
};
pub use error::RateSourceError;
pub use exchangerate_api::ExchangeRateApiClient;
pub use frankfurter::FrankfurterClient;
pub use open_er_api::OpenErApiClient;
pub use provider::{HistoricalRateProvider, LiveRateProvider};
pub use types::{DailyRate, QuoteRates};
