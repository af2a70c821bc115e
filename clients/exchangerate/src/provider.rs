//! Provider traits shared by the live and historical clients.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::RateSourceError;
use crate::types::{DailyRate, QuoteRates};

/// A source of current exchange rates for a base currency.
///
/// Implementations are tried in order by the caller; any error moves on to
/// the next provider.
#[async_trait]
pub trait LiveRateProvider: Send + Sync {
    /// Stable identifier used in logs.
    fn id(&self) -> &'static str;

    /// Fetches every quote currency the provider knows for `base`.
    async fn latest(&self, base: &str) -> Result<QuoteRates, RateSourceError>;
}

/// A source of daily historical rates for a currency pair.
#[async_trait]
pub trait HistoricalRateProvider: Send + Sync {
    fn id(&self) -> &'static str;

    /// Returns one value per day with data in `[start, end]`, ordered by
    /// ascending date. Days without data are omitted, not interpolated.
    async fn daily_series(
        &self,
        base: &str,
        quote: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRate>, RateSourceError>;
}
