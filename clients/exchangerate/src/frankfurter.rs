use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::{ExchangeRateClientConfig, FRANKFURTER_BASE_URL};
use crate::error::RateSourceError;
use crate::provider::HistoricalRateProvider;
use crate::types::{DailyRate, FrankfurterTimeseries};
use crate::utils;

const PROVIDER_ID: &str = "frankfurter";

/// Client for the api.frankfurter.app time-series endpoint (ECB data).
///
/// The endpoint is rate-limited, so callers should request a whole range
/// in one go rather than day by day.
pub struct FrankfurterClient {
    client: reqwest::Client,
    base_url: String,
}

impl FrankfurterClient {
    pub fn new(client: reqwest::Client, config: ExchangeRateClientConfig) -> Self {
        Self {
            client,
            base_url: config.base_url,
        }
    }

    pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, RateSourceError> {
        let config = ExchangeRateClientConfig::new(FRANKFURTER_BASE_URL, timeout);
        let client = config
            .build_client()
            .map_err(|e| RateSourceError::from_reqwest(PROVIDER_ID, e))?;
        Ok(Self::new(client, config))
    }
}

/// Extracts the `quote` series from a time-series payload, ordered by date.
pub fn parse_timeseries(body: &str, quote: &str) -> Result<Vec<DailyRate>, RateSourceError> {
    let payload: FrankfurterTimeseries = utils::decode(PROVIDER_ID, body)?;
    // BTreeMap keys are already in ascending date order.
    Ok(payload
        .rates
        .into_iter()
        .filter_map(|(date, day)| {
            let rate = *day.get(quote)?;
            Some(DailyRate { date, rate })
        })
        .collect())
}

#[async_trait]
impl HistoricalRateProvider for FrankfurterClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn daily_series(
        &self,
        base: &str,
        quote: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRate>, RateSourceError> {
        let range = format!("{}..{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"));
        let url = utils::build_url(
            PROVIDER_ID,
            &self.base_url,
            &[&range],
            &[("from", base), ("to", quote)],
        )?;
        tracing::debug!(provider = PROVIDER_ID, %url, "fetching historical series");
        let body = utils::get_text(&self.client, PROVIDER_ID, url).await?;
        let series = parse_timeseries(&body, quote)?;
        if series.is_empty() {
            return Err(RateSourceError::DataUnavailable {
                provider: PROVIDER_ID,
                base: base.to_string(),
                quote: quote.to_string(),
            });
        }
        Ok(series)
    }
}
