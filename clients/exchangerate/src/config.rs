use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const OPEN_ER_API_BASE_URL: &str = "https://open.er-api.com/v6";
pub const EXCHANGERATE_API_BASE_URL: &str = "https://v6.exchangerate-api.com/v6";
pub const FRANKFURTER_BASE_URL: &str = "https://api.frankfurter.app";

/// Configuration shared by the exchange rate HTTP clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateClientConfig {
    /// Base URL for API endpoints
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ExchangeRateClientConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Builds a `reqwest::Client` honouring the configured timeout.
    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder().timeout(self.timeout).build()
    }
}
