use std::path::PathBuf;

use clients_exchangerate::RateSourceError;
use thiserror::Error;

use crate::types::CurrencyPair;

/// Errors raised by threshold computation, persistence and configuration.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("invalid currency pair '{0}', expected BASE/QUOTE")]
    InvalidPair(String),

    /// Percentile outside (0, 50].
    #[error("percentile {0} is outside (0, 50]")]
    InvalidPercentile(u32),

    #[error("day of month {0} is outside 1..=31")]
    InvalidDayOfMonth(u32),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("no historical data available for {pair}")]
    NoHistoricalData { pair: CurrencyPair },

    #[error(transparent)]
    Source(#[from] RateSourceError),

    /// The threshold store could not be read or written.
    #[error("threshold store {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("threshold store is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl AlertError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}
