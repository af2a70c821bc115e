use async_trait::async_trait;

use crate::config::{ExchangeRateClientConfig, EXCHANGERATE_API_BASE_URL};
use crate::error::RateSourceError;
use crate::provider::LiveRateProvider;
use crate::types::{ExchangeRateApiLatest, QuoteRates};
use crate::utils;

const PROVIDER_ID: &str = "exchangerate-api";

/// Client for v6.exchangerate-api.com. Requires an API key.
pub struct ExchangeRateApiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ExchangeRateApiClient {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        config: ExchangeRateClientConfig,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: config.base_url,
        }
    }

    pub fn with_timeout(
        api_key: String,
        timeout: std::time::Duration,
    ) -> Result<Self, RateSourceError> {
        let config = ExchangeRateClientConfig::new(EXCHANGERATE_API_BASE_URL, timeout);
        let client = config
            .build_client()
            .map_err(|e| RateSourceError::from_reqwest(PROVIDER_ID, e))?;
        Ok(Self::new(client, api_key, config))
    }
}

/// Normalizes an exchangerate-api.com payload into `QuoteRates`.
pub fn parse_latest(body: &str) -> Result<QuoteRates, RateSourceError> {
    let payload: ExchangeRateApiLatest = utils::decode(PROVIDER_ID, body)?;
    if payload.result != "success" {
        return Err(RateSourceError::MalformedResponse {
            provider: PROVIDER_ID,
            message: format!(
                "result={} error-type={}",
                payload.result,
                payload.error_type.as_deref().unwrap_or("unknown")
            ),
        });
    }
    payload
        .conversion_rates
        .ok_or_else(|| RateSourceError::MalformedResponse {
            provider: PROVIDER_ID,
            message: "missing conversion_rates".to_string(),
        })
}

#[async_trait]
impl LiveRateProvider for ExchangeRateApiClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn latest(&self, base: &str) -> Result<QuoteRates, RateSourceError> {
        let url = utils::build_url(
            PROVIDER_ID,
            &self.base_url,
            &[&self.api_key, "latest", base],
            &[],
        )?;
        let body = utils::get_text(&self.client, PROVIDER_ID, url).await?;
        parse_latest(&body)
    }
}
