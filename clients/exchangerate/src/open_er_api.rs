use async_trait::async_trait;

use crate::config::{ExchangeRateClientConfig, OPEN_ER_API_BASE_URL};
use crate::error::RateSourceError;
use crate::provider::LiveRateProvider;
use crate::types::{OpenErApiLatest, QuoteRates};
use crate::utils;

const PROVIDER_ID: &str = "open-er-api";

/// Client for the free open.er-api.com latest-rates endpoint.
///
/// This is the primary live source; it needs no API key.
pub struct OpenErApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenErApiClient {
    pub fn new(client: reqwest::Client, config: ExchangeRateClientConfig) -> Self {
        Self {
            client,
            base_url: config.base_url,
        }
    }

    /// Client against the public endpoint with its own `reqwest::Client`.
    pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, RateSourceError> {
        let config = ExchangeRateClientConfig::new(OPEN_ER_API_BASE_URL, timeout);
        let client = config
            .build_client()
            .map_err(|e| RateSourceError::from_reqwest(PROVIDER_ID, e))?;
        Ok(Self::new(client, config))
    }
}

/// Normalizes an open.er-api.com payload into `QuoteRates`.
pub fn parse_latest(body: &str) -> Result<QuoteRates, RateSourceError> {
    let payload: OpenErApiLatest = utils::decode(PROVIDER_ID, body)?;
    if let Some(result) = payload.result.as_deref() {
        if result != "success" {
            return Err(RateSourceError::MalformedResponse {
                provider: PROVIDER_ID,
                message: format!(
                    "result={} error-type={}",
                    result,
                    payload.error_type.as_deref().unwrap_or("unknown")
                ),
            });
        }
    }
    payload
        .rates
        .ok_or_else(|| RateSourceError::MalformedResponse {
            provider: PROVIDER_ID,
            message: "missing rates".to_string(),
        })
}

#[async_trait]
impl LiveRateProvider for OpenErApiClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn latest(&self, base: &str) -> Result<QuoteRates, RateSourceError> {
        let url = utils::build_url(PROVIDER_ID, &self.base_url, &["latest", base], &[])?;
        let body = utils::get_text(&self.client, PROVIDER_ID, url).await?;
        parse_latest(&body)
    }
}
