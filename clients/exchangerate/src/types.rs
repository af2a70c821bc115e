use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;

/// Quote currency -> rate, for a single base currency.
pub type QuoteRates = BTreeMap<String, f64>;

/// One day of a historical series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyRate {
    pub date: NaiveDate,
    pub rate: f64,
}

/// Latest rates from open.er-api.com.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenErApiLatest {
    /// Present on real payloads; "success" or "error".
    #[serde(default)]
    pub result: Option<String>,
    #[serde(rename = "error-type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub rates: Option<QuoteRates>,
}

/// Latest rates from v6.exchangerate-api.com (key-gated).
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRateApiLatest {
    pub result: String,
    #[serde(rename = "error-type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub conversion_rates: Option<QuoteRates>,
}

/// Time series from api.frankfurter.app.
#[derive(Debug, Clone, Deserialize)]
pub struct FrankfurterTimeseries {
    pub rates: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}
