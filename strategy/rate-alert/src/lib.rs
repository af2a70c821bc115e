//! Exchange rate alerting.
//!
//! Computes percentile-based alert bands from historical daily rates,
//! persists them, and monitors live rates against them, notifying when a
//! pair leaves its band.

pub mod calculator;
pub mod config;
mod error;
pub mod monitor;
mod source;
pub mod store;
mod types;

pub use calculator::{percentile_value, threshold_from_series, ThresholdCalculator};
pub use config::AppConfig;
pub use error::AlertError;
pub use monitor::{MonitorSettings, RateMonitor, RuleOrigin};
pub use source::RateSource;
pub use store::{ThresholdStatus, ThresholdStore};
pub use types::{
    BandState, BatchMetadata, CurrencyPair, RateSnapshot, Rule, RuleSet, Threshold, ThresholdSet,
};
